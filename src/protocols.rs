//! Protocol reference table - stage 1 of the pipeline.
//!
//! Flow-log records refer to protocols by the row position of the protocol
//! reference table, not by IANA protocol number. The table is therefore a
//! plain sequence indexed by the record's parsed identifier field.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::TableError;

/// Immutable protocol-identifier-to-name table.
///
/// The identifier is the zero-based row position in the source; the textual
/// content of column 0 is ignored for keying. Reordering two source rows
/// changes which identifier maps to which name even when their text is
/// identical. The name is column 1, lowercased and trimmed.
#[derive(Debug, Clone, Default)]
pub struct ProtocolTable {
    names: Vec<String>,
}

impl ProtocolTable {
    /// Builds the table from comma-separated rows without a header.
    ///
    /// Rows are read line by line and split on commas; a CSV reader would
    /// drop blank rows entirely, renumbering every later identifier. Any
    /// row with fewer than 2 columns (blank rows included) aborts the
    /// build: skipping it would shift every later identifier and silently
    /// misclassify the whole log.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut names = Vec::new();
        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let row = index + 1;
            let line = line.map_err(|source| TableError::Io { row, source })?;

            let columns: Vec<&str> = line.trim().split(',').collect();
            if columns.len() < 2 {
                return Err(TableError::ProtocolColumns {
                    row,
                    found: columns.len(),
                });
            }
            names.push(columns[1].trim().to_lowercase());
        }

        debug!("Protocol table built with {} rows", names.len());
        Ok(Self { names })
    }

    /// Builds the table from a CSV file on disk.
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open protocol table: {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("failed to parse protocol table: {}", path.display()))?;
        Ok(table)
    }

    /// Looks up a protocol name by row identifier.
    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Returns the number of rows loaded.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
