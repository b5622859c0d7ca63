//! CSV Ingestion

use crate::{Record, RecordError, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Rows of a headered tabular file
#[derive(Debug)]
pub struct Table {
    /// Header names in file order
    pub columns: Vec<String>,
    /// One entry per data row; a malformed row does not abort the file
    pub rows: Vec<Result<Record, RecordError>>,
    /// Cell text of each data row as read (trimmed), parallel to `rows`.
    /// Empty when the reader could not split the row.
    pub raw: Vec<Vec<String>>,
}

impl Table {
    /// Rows that parsed cleanly
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Number of data rows, including malformed ones
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a headered CSV from any reader.
///
/// Lines starting with `#` are skipped, as in the NASA Exoplanet Archive
/// exports.
pub fn read_csv<R: Read>(reader: R) -> Result<Table, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| RecordError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut seen = HashSet::with_capacity(columns.len());
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(RecordError::DuplicateColumn(column.clone()));
        }
    }

    let mut rows = Vec::new();
    let mut raw = Vec::new();
    for (row, result) in reader.records().enumerate() {
        raw.push(match &result {
            Ok(cells) => cells.iter().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        });
        let parsed = match result {
            Ok(cells) if cells.len() != columns.len() => Err(RecordError::MalformedRow {
                row,
                expected: columns.len(),
                found: cells.len(),
            }),
            Ok(cells) => {
                let mut record = Record::with_capacity(columns.len());
                for (column, cell) in columns.iter().zip(cells.iter()) {
                    record.insert(column.as_str(), Value::parse(cell));
                }
                Ok(record)
            }
            Err(e) => Err(RecordError::Csv(format!("row {}: {}", row, e))),
        };
        if let Err(e) = &parsed {
            debug!("Skipping unreadable row: {}", e);
        }
        rows.push(parsed);
    }

    debug!("Read {} rows x {} columns", rows.len(), columns.len());
    Ok(Table { columns, rows, raw })
}

/// Read a headered CSV file from disk
pub fn read_csv_path(path: impl AsRef<Path>) -> Result<Table, RecordError> {
    let path = path.as_ref();
    info!("Loading tabular data from {}", path.display());
    let file = File::open(path).map_err(|e| RecordError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    read_csv(file)
}
