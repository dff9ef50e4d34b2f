//! Tag lookup table - stage 2 of the pipeline.
//!
//! Maps a (destination port, protocol name) pair to a user-defined
//! classification tag, and records the ordered set of distinct tags so the
//! classifier can pre-seed its tag counters.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::TableError;

/// Composite (destination port, protocol name) key.
///
/// Both fields are kept verbatim as they appear in the source: leading zeros
/// in the port matter, and a lookup row's protocol must already be lowercase
/// to match the protocol table's names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub port: String,
    pub protocol: String,
}

impl FlowKey {
    pub fn new(port: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            protocol: protocol.into(),
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.port, self.protocol)
    }
}

/// Immutable (port, protocol) to tag mapping.
#[derive(Debug, Clone, Default)]
pub struct TagLookup {
    tags: HashMap<FlowKey, String>,
    tag_order: Vec<String>,
}

impl TagLookup {
    /// Builds the lookup from CSV rows with exactly one header row.
    ///
    /// The header is always discarded; an empty source yields an empty
    /// lookup. Data rows need at least 3 columns (`port,protocol,tag`).
    /// Later rows overwrite earlier rows for the same key, but the ordered
    /// tag set still records every distinct tag at first sighting.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut lookup = Self::default();
        for (index, record) in csv_reader.records().enumerate() {
            let row = index + 1;
            let record = record.map_err(|source| TableError::Read { row, source })?;
            if record.len() < 3 {
                return Err(TableError::LookupColumns {
                    row,
                    found: record.len(),
                });
            }

            let key = FlowKey::new(&record[0], &record[1]);
            let tag = record[2].trim().to_lowercase();
            if !lookup.tag_order.contains(&tag) {
                lookup.tag_order.push(tag.clone());
            }
            lookup.tags.insert(key, tag);
        }

        debug!(
            "Tag lookup built with {} entries, {} distinct tags",
            lookup.tags.len(),
            lookup.tag_order.len()
        );
        Ok(lookup)
    }

    /// Builds the lookup from a CSV file on disk.
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open lookup table: {}", path.display()))?;
        let lookup = Self::from_reader(file)
            .with_context(|| format!("failed to parse lookup table: {}", path.display()))?;
        Ok(lookup)
    }

    /// Resolves the tag for a (port, protocol) key, if one is defined.
    pub fn tag(&self, key: &FlowKey) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Distinct tag values in the order they were first encountered.
    pub fn tag_order(&self) -> &[String] {
        &self.tag_order
    }

    /// Returns the number of lookup entries.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
