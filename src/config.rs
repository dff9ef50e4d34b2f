//! Configuration Module
//!
//! Provides TOML-based configuration for flowtag.
//! Configuration is optional - CLI arguments override file settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::OutputFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub inputs: InputConfig,
    pub outputs: OutputConfig,
    pub report: ReportConfig,
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads configuration from file if it exists, otherwise returns defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load(p).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Generates a default configuration file content
    pub fn generate_default() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| "# Failed to generate config".to_string())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("inputs.protocols", &self.inputs.protocols),
            ("inputs.lookup", &self.inputs.lookup),
            ("inputs.flow_log", &self.inputs.flow_log),
            ("outputs.tag_counts", &self.outputs.tag_counts),
            (
                "outputs.port_protocol_counts",
                &self.outputs.port_protocol_counts,
            ),
        ] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }
        if self.outputs.tag_counts == self.outputs.port_protocol_counts {
            anyhow::bail!("the two output paths must differ");
        }
        Ok(())
    }
}

/// Input-path configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Protocol reference table (CSV, no header; row position = identifier)
    pub protocols: PathBuf,
    /// Tag lookup table (CSV with a header row: port,protocol,tag)
    pub lookup: PathBuf,
    /// Flow log (whitespace-delimited records, one per line)
    pub flow_log: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            protocols: PathBuf::from("protocols.csv"),
            lookup: PathBuf::from("input_lookup.csv"),
            flow_log: PathBuf::from("input_flowlog.txt"),
        }
    }
}

/// Output-path configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Tag,Count table destination
    pub tag_counts: PathBuf,
    /// Port,Protocol,Count table destination
    pub port_protocol_counts: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tag_counts: PathBuf::from("output_tag_counts.csv"),
            port_protocol_counts: PathBuf::from("output_port_protocol_combination_counts.csv"),
        }
    }
}

/// Summary/report configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Summary format (text, json)
    #[serde(with = "output_format_serde")]
    pub format: OutputFormat,
    /// Enable verbose logging
    pub verbose: bool,
}

/// Custom serde implementation for OutputFormat
mod output_format_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(format: &OutputFormat, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OutputFormat, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
