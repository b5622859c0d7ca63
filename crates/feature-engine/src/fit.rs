//! Schema Fitting
//!
//! Builds the feature contract and scaler statistics from a labelled
//! reference dataset. The classifier itself is trained elsewhere on the
//! output of the same transformation.

use crate::categorical::dummy_columns;
use crate::features::{EngineeredRecord, FeatureEngineer};
use crate::statistics::ColumnStatistics;
use crate::FeatureError;
use feature_schema::{FeatureSchema, ScalerParams};
use koi_record::columns::LABEL_COLUMN;
use koi_record::{Disposition, Record, Value};
use tracing::{info, warn};

/// Fits a `FeatureSchema` from reference records
#[derive(Debug, Clone, Default)]
pub struct SchemaFitter {
    engineer: FeatureEngineer,
}

impl SchemaFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep CANDIDATE/CONFIRMED rows (rows with no label column at all are
    /// kept too), engineer them with batch medians and fit z-score
    /// parameters per column, in first-appearance column order.
    pub fn fit(&self, records: &[Record]) -> Result<FeatureSchema, FeatureError> {
        let rows: Vec<Record> = records
            .iter()
            .filter(|r| match r.get(LABEL_COLUMN) {
                Some(Value::Text(label)) => Disposition::from_label(label).is_some(),
                Some(_) => false,
                None => true,
            })
            .cloned()
            .collect();

        if rows.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }

        let engineered = self.engineer.engineer_batch(&rows);
        let columns = complete_columns(&engineered);

        let produced = self.engineer.produced_features();
        let missing: Vec<String> = produced
            .iter()
            .filter(|p| !columns.contains(p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingInputs(missing));
        }

        let mut scaler = Vec::with_capacity(columns.len());
        for column in &columns {
            let values: Vec<f64> = engineered.iter().filter_map(|r| r.get(column)).collect();
            let stats = ColumnStatistics::compute(&values).ok_or(FeatureError::EmptyDataset)?;
            scaler.push(ScalerParams::fitted(stats.mean, stats.std_dev));
        }

        info!(
            "Fitted schema over {} rows: {} features ({} dummies)",
            rows.len(),
            columns.len(),
            dummy_columns().len()
        );
        Ok(FeatureSchema::new(columns, scaler)?)
    }
}

/// Columns defined in every engineered row, in first-appearance order
fn complete_columns(rows: &[EngineeredRecord]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for row in rows {
        for name in row.names() {
            if !order.iter().any(|c| c == name) {
                order.push(name.to_string());
            }
        }
    }

    order
        .into_iter()
        .filter(|column| {
            let complete = rows.iter().all(|r| r.contains(column));
            if !complete {
                warn!("Column {} has no value in some rows; left out of the schema", column);
            }
            complete
        })
        .collect()
}
