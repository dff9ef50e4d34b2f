//! flowtag: batch flow-log classifier.
//!
//! Classifies network flow-log records by destination port and protocol
//! against a user-supplied lookup table, and writes two CSV count tables:
//! occurrences per tag and per distinct (port, protocol) pair.
//!
//! # Pipeline
//!
//! ```text
//! ┌───────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ ProtocolTable │────>│  TagLookup  │────>│ Classify + Count │──> CSV x2
//! │   (stage 1)   │     │  (stage 2)  │     │    (stage 3)     │
//! └───────────────┘     └─────────────┘     └──────────────────┘
//! ```
//!
//! Stages run strictly in order; stage 3 is a single streaming pass over
//! the flow log. Outputs are only written after stage 3 completes, so a
//! failed run never leaves partial count tables behind.

mod classify;
mod config;
mod error;
mod lookup;
mod protocols;
mod report;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::classify::classify;
use crate::config::Config;
use crate::error::Result;
use crate::lookup::TagLookup;
use crate::protocols::ProtocolTable;
use crate::report::{write_pair_counts, write_tag_counts, RunSummary};

/// flowtag: classify flow-log records against a port/protocol taxonomy.
#[derive(Parser, Debug)]
#[command(name = "flowtag")]
#[command(version = "0.1.0")]
#[command(about = "Tag flow-log records by destination port and protocol and emit aggregate counts")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the classification pipeline.
    Classify {
        /// Path to a TOML config file (CLI arguments override it).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Protocol reference table (CSV, no header; row position = identifier).
        #[arg(short, long)]
        protocols: Option<PathBuf>,

        /// Tag lookup table (CSV with a header row: port,protocol,tag).
        #[arg(short, long)]
        lookup: Option<PathBuf>,

        /// Flow log (whitespace-delimited records, one per line).
        #[arg(short = 'F', long)]
        flow_log: Option<PathBuf>,

        /// Output path for the Tag,Count table.
        #[arg(short, long)]
        tag_counts: Option<PathBuf>,

        /// Output path for the Port,Protocol,Count table.
        #[arg(short = 'P', long)]
        port_protocol_counts: Option<PathBuf>,

        /// Summary format: text, json.
        #[arg(short = 'o', long)]
        format: Option<String>,

        /// Enable verbose logging (writes to stderr).
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a default configuration file to stdout.
    GenerateConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            config,
            protocols,
            lookup,
            flow_log,
            tag_counts,
            port_protocol_counts,
            format,
            verbose,
        } => {
            let mut cfg = Config::load_or_default(config.as_deref());
            if let Some(path) = protocols {
                cfg.inputs.protocols = path;
            }
            if let Some(path) = lookup {
                cfg.inputs.lookup = path;
            }
            if let Some(path) = flow_log {
                cfg.inputs.flow_log = path;
            }
            if let Some(path) = tag_counts {
                cfg.outputs.tag_counts = path;
            }
            if let Some(path) = port_protocol_counts {
                cfg.outputs.port_protocol_counts = path;
            }
            if let Some(format) = format {
                cfg.report.format = format.parse().map_err(anyhow::Error::msg)?;
            }
            if verbose {
                cfg.report.verbose = true;
            }
            cfg.validate()?;

            // Initialize logging
            let log_level = if cfg.report.verbose {
                Level::DEBUG
            } else {
                Level::INFO
            };
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;

            run_classify(&cfg)
        }

        Commands::GenerateConfig => {
            print!("{}", Config::generate_default());
            Ok(())
        }
    }
}

/// Runs the three pipeline stages in order and writes both count tables.
fn run_classify(cfg: &Config) -> Result<()> {
    let protocols = ProtocolTable::from_path(&cfg.inputs.protocols)?;
    info!(
        "Loaded {} protocol table rows from {}",
        protocols.len(),
        cfg.inputs.protocols.display()
    );

    let lookup = TagLookup::from_path(&cfg.inputs.lookup)?;
    info!(
        "Loaded {} lookup entries ({} distinct tags) from {}",
        lookup.len(),
        lookup.tag_order().len(),
        cfg.inputs.lookup.display()
    );

    let flow_log = File::open(&cfg.inputs.flow_log)
        .with_context(|| format!("failed to open flow log: {}", cfg.inputs.flow_log.display()))?;
    let result = classify(BufReader::new(flow_log), &protocols, &lookup)
        .with_context(|| format!("failed to classify flow log: {}", cfg.inputs.flow_log.display()))?;
    info!(
        "Classified {} flow-log records ({} distinct port/protocol pairs)",
        result.records,
        result.pair_counts.len()
    );

    write_tag_counts(&cfg.outputs.tag_counts, &result.tag_counts)?;
    write_pair_counts(&cfg.outputs.port_protocol_counts, &result.pair_counts)?;
    info!(
        "Wrote {} and {}",
        cfg.outputs.tag_counts.display(),
        cfg.outputs.port_protocol_counts.display()
    );

    let summary = RunSummary::from(&result);
    println!("{}", summary.render(cfg.report.format));

    Ok(())
}
