//! Default Value Provider

use crate::FallbackError;
use feature_engine::ColumnMedians;
use koi_record::{read_csv_path, Record};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Per-feature fallback values: numeric medians over the reference dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultValueTable {
    medians: ColumnMedians,
    rows: usize,
}

impl DefaultValueTable {
    /// Compute the table from reference records
    pub fn from_records(records: &[Record]) -> Result<Self, FallbackError> {
        let medians = ColumnMedians::from_records(records);
        if medians.is_empty() {
            return Err(FallbackError::DataUnavailable(
                "reference dataset has no numeric columns".to_string(),
            ));
        }
        Ok(Self {
            medians,
            rows: records.len(),
        })
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.medians.get(feature)
    }

    /// Medians in the form the feature engineer imputes from
    pub fn medians(&self) -> &ColumnMedians {
        &self.medians
    }

    /// Number of reference rows the medians were taken over
    pub fn rows(&self) -> usize {
        self.rows
    }
}

enum Source {
    Path(PathBuf),
    Records(Vec<Record>),
}

/// Lazily computes and memoizes the default value table.
///
/// The first successful computation is kept for the life of the provider; a
/// failed one is reported and not cached.
pub struct DefaultValueProvider {
    source: Source,
    table: OnceLock<DefaultValueTable>,
}

impl DefaultValueProvider {
    /// Provider backed by a reference CSV file
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Path(path.into()),
            table: OnceLock::new(),
        }
    }

    /// Provider backed by records already in memory
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            source: Source::Records(records),
            table: OnceLock::new(),
        }
    }

    /// The default value table, computed on first use
    pub fn defaults(&self) -> Result<&DefaultValueTable, FallbackError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let table = self.compute()?;
        Ok(self.table.get_or_init(|| table))
    }

    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    /// Drop the memoized table so the next call recomputes it
    pub fn invalidate(&mut self) {
        if self.table.take().is_some() {
            info!("Default value table invalidated");
        }
    }

    fn compute(&self) -> Result<DefaultValueTable, FallbackError> {
        let table = match &self.source {
            Source::Path(path) => {
                let data = read_csv_path(path)
                    .map_err(|e| FallbackError::DataUnavailable(e.to_string()))?;
                let skipped = data.rows.iter().filter(|r| r.is_err()).count();
                if skipped > 0 {
                    warn!("Skipped {} unreadable reference rows", skipped);
                }
                let records: Vec<Record> = data.rows.into_iter().filter_map(Result::ok).collect();
                DefaultValueTable::from_records(&records)?
            }
            Source::Records(records) => DefaultValueTable::from_records(records)?,
        };
        info!(
            "Computed {} default values over {} reference rows",
            table.medians.len(),
            table.rows
        );
        Ok(table)
    }
}
