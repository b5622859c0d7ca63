//! KOI Records
//!
//! Provides the ordered record type shared by every stage of the disposition
//! pipeline, the KOI column vocabulary, and CSV ingestion.

pub mod columns;
mod record;
mod table;

pub use columns::Disposition;
pub use record::{Record, Value};
pub use table::{read_csv, read_csv_path, Table};

use thiserror::Error;

/// Errors while ingesting tabular data
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to open {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Malformed CSV: {0}")]
    Csv(String),
    #[error("Row {row}: expected {expected} cells, found {found}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Duplicate column in header: {0}")]
    DuplicateColumn(String),
}
