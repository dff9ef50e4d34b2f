//! Domain-specific error types for flowtag.
//!
//! Uses `thiserror` for ergonomic error definitions that integrate
//! with the broader `anyhow` error handling strategy.

use thiserror::Error;

/// Errors that can occur while building the reference tables.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("protocol table row {row}: found {found} column(s), need at least 2")]
    ProtocolColumns { row: usize, found: usize },

    #[error("lookup table data row {row}: found {found} column(s), need at least 3")]
    LookupColumns { row: usize, found: usize },

    #[error("failed to read protocol table row {row}: {source}")]
    Io {
        row: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read lookup table row {row}: {source}")]
    Read {
        row: usize,
        #[source]
        source: csv::Error,
    },
}

/// Errors that can occur while classifying flow-log records.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("flow-log record {line}: found {found} field(s), need at least 8")]
    TooFewFields { line: usize, found: usize },

    #[error("flow-log record {line}: protocol identifier '{id}' is not a non-negative integer")]
    BadProtocolId { line: usize, id: String },

    #[error(
        "flow-log record {line}: protocol identifier {id} has no protocol table entry \
         ({rows} rows loaded)"
    )]
    UnknownProtocol { line: usize, id: usize, rows: usize },

    #[error("failed to read flow-log record {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
