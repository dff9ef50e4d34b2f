//! Count-table output and run summaries.
//!
//! Writes the two CSV count tables and renders a post-run summary in text
//! or JSON for integration with other tooling.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::classify::{Classification, PairCounts, TagCounts, UNTAGGED};
use crate::error::Result;

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Writes the tag-count table: header `Tag,Count`, one row per seeded tag
/// (including zero-count tags and `Untagged`), in seeding order.
pub fn write_tag_counts(path: &Path, counts: &TagCounts) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create tag-count output: {}", path.display()))?;

    writer.write_record(["Tag", "Count"])?;
    for (tag, count) in counts.iter() {
        let count = count.to_string();
        writer.write_record([tag, count.as_str()])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write tag-count output: {}", path.display()))?;
    Ok(())
}

/// Writes the port/protocol-count table: header `Port,Protocol,Count`, one
/// row per distinct observed pair, in first-seen order. No sorting.
pub fn write_pair_counts(path: &Path, counts: &PairCounts) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_path(path).with_context(|| {
        format!(
            "failed to create port/protocol-count output: {}",
            path.display()
        )
    })?;

    writer.write_record(["Port", "Protocol", "Count"])?;
    for (key, count) in counts.iter() {
        let count = count.to_string();
        writer.write_record([key.port.as_str(), key.protocol.as_str(), count.as_str()])?;
    }
    writer.flush().with_context(|| {
        format!(
            "failed to write port/protocol-count output: {}",
            path.display()
        )
    })?;
    Ok(())
}

/// JSON-serializable summary of a classification run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub records: u64,
    pub distinct_pairs: usize,
    pub tagged: u64,
    pub untagged: u64,
}

impl From<&Classification> for RunSummary {
    fn from(result: &Classification) -> Self {
        let untagged = result.tag_counts.get(UNTAGGED);
        Self {
            records: result.records,
            distinct_pairs: result.pair_counts.len(),
            tagged: result.records - untagged,
            untagged,
        }
    }
}

impl RunSummary {
    /// Renders the summary in the requested format.
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => format!(
                "--- Classification Summary ---\nRecords: {}\nDistinct Port/Protocol Pairs: {}\nTagged: {}\nUntagged: {}",
                self.records, self.distinct_pairs, self.tagged, self.untagged
            ),
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::lookup::TagLookup;
    use crate::protocols::ProtocolTable;
    use std::fs;

    fn sample_classification() -> Classification {
        let protocols =
            ProtocolTable::from_reader("0,HOPOPT\n1,ICMP\n2,IGMP\n3,GGP\n4,IPv4\n5,ST\n6,TCP\n".as_bytes())
                .unwrap();
        let lookup =
            TagLookup::from_reader("Port,Protocol,Tag\n25,tcp,email\n443,tcp,web\n".as_bytes())
                .unwrap();
        let log = "\
2 123456789012 eni-0a 10.0.1.201 198.51.100.2 443 25 6 25 20000 1620140761 1620140821 ACCEPT OK
2 123456789012 eni-0a 10.0.1.202 198.51.100.3 443 25 6 25 20000 1620140761 1620140821 ACCEPT OK
2 123456789012 eni-0a 10.0.1.203 198.51.100.4 443 9999 6 25 20000 1620140761 1620140821 ACCEPT OK
";
        classify(log.as_bytes(), &protocols, &lookup).unwrap()
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_tag_counts_csv_includes_zero_rows() {
        let result = sample_classification();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.csv");

        write_tag_counts(&path, &result.tag_counts).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Tag,Count\nemail,2\nweb,0\nUntagged,1\n");
    }

    #[test]
    fn test_pair_counts_csv_in_first_seen_order() {
        let result = sample_classification();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.csv");

        write_pair_counts(&path, &result.pair_counts).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Port,Protocol,Count\n25,tcp,2\n9999,tcp,1\n");
    }

    #[test]
    fn test_run_summary_totals() {
        let result = sample_classification();
        let summary = RunSummary::from(&result);

        assert_eq!(summary.records, 3);
        assert_eq!(summary.distinct_pairs, 2);
        assert_eq!(summary.tagged, 2);
        assert_eq!(summary.untagged, 1);
    }

    #[test]
    fn test_run_summary_render_json() {
        let result = sample_classification();
        let rendered = RunSummary::from(&result).render(OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["records"], 3);
        assert_eq!(parsed["untagged"], 1);
    }

    #[test]
    fn test_run_summary_render_text() {
        let result = sample_classification();
        let rendered = RunSummary::from(&result).render(OutputFormat::Text);
        assert!(rendered.contains("Records: 3"));
        assert!(rendered.contains("Untagged: 1"));
    }
}
