//! Batch Prediction
//!
//! Classifies every row of an uploaded table. Rows that fail validation are
//! flagged and skipped; the rest go through the classifier in one call.

use crate::engine::PredictionResult;
use crate::pipeline::LoadedModel;
use crate::InferenceError;
use data_validator::ValidationError;
use koi_record::columns::LABEL_COLUMN;
use koi_record::{Disposition, Record, Table, Value};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// Columns appended to the original ones in a CSV export
const EXPORT_COLUMNS: [&str; 4] = [
    "predicted_label",
    "confidence",
    "prob_candidate",
    "prob_confirmed",
];

/// A successfully classified row
#[derive(Debug, Clone, Serialize)]
pub struct RowPrediction {
    /// Zero-based data row index in the upload
    pub row: usize,
    /// Row as parsed
    pub record: Record,
    /// Cell text as uploaded, in header order
    #[serde(skip)]
    pub cells: Vec<String>,
    pub prediction: PredictionResult,
}

/// A row skipped because of malformed input
#[derive(Debug, Clone, Serialize)]
pub struct RowFlag {
    pub row: usize,
    pub errors: Vec<ValidationError>,
}

/// Agreement with the uploaded `koi_disposition` labels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// `confusion[actual][predicted]`, CANDIDATE = 0, CONFIRMED = 1
    pub confusion: [[usize; 2]; 2],
    /// Labelled rows compared
    pub support: usize,
    pub accuracy: f64,
}

impl Evaluation {
    fn from_results(results: &[RowPrediction]) -> Option<Self> {
        let mut confusion = [[0usize; 2]; 2];
        let mut support = 0;
        for r in results {
            let actual = r
                .record
                .get(LABEL_COLUMN)
                .and_then(Value::as_text)
                .and_then(Disposition::from_label);
            if let Some(actual) = actual {
                confusion[actual.index()][r.prediction.label.index()] += 1;
                support += 1;
            }
        }
        if support == 0 {
            return None;
        }
        let correct = confusion[0][0] + confusion[1][1];
        Some(Self {
            confusion,
            support,
            accuracy: correct as f64 / support as f64,
        })
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Header of the uploaded table
    pub columns: Vec<String>,
    pub results: Vec<RowPrediction>,
    pub flags: Vec<RowFlag>,
    /// Present when the upload carries ground-truth labels
    pub evaluation: Option<Evaluation>,
}

impl BatchReport {
    pub fn total_rows(&self) -> usize {
        self.results.len() + self.flags.len()
    }

    /// Export the uploaded cells unchanged plus label, confidence and class
    /// probabilities for every classified row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), InferenceError> {
        let mut out = csv::Writer::from_writer(writer);
        let to_err =
            |e: csv::Error| InferenceError::InferenceFailed(format!("CSV export failed: {}", e));

        let header = self
            .columns
            .iter()
            .map(String::as_str)
            .chain(EXPORT_COLUMNS.iter().copied());
        out.write_record(header).map_err(to_err)?;

        for r in &self.results {
            let mut cells = r.cells.clone();
            cells.push(r.prediction.label.to_string());
            cells.push(r.prediction.confidence.to_string());
            cells.push(r.prediction.p_candidate().to_string());
            cells.push(r.prediction.p_confirmed().to_string());
            out.write_record(&cells).map_err(to_err)?;
        }

        out.flush()
            .map_err(|e| InferenceError::InferenceFailed(format!("CSV export failed: {}", e)))
    }
}

/// Runs a loaded model over a whole table
pub struct BatchPredictor<'a> {
    model: &'a LoadedModel,
}

impl<'a> BatchPredictor<'a> {
    pub fn new(model: &'a LoadedModel) -> Self {
        Self { model }
    }

    /// Validate, engineer with batch medians, normalize and classify.
    ///
    /// Malformed rows never fail the batch; a schema mismatch or classifier
    /// failure does.
    pub fn run(&self, table: Table) -> Result<BatchReport, InferenceError> {
        let mut accepted: Vec<(usize, Record, Vec<String>)> =
            Vec::with_capacity(table.rows.len());
        let mut flags = Vec::new();

        for (row, (parsed, cells)) in table.rows.into_iter().zip(table.raw).enumerate() {
            match parsed {
                Ok(record) => match self.model.validator().validate(&record) {
                    Ok(()) => accepted.push((row, record, cells)),
                    Err(errors) => flags.push(RowFlag { row, errors }),
                },
                Err(e) => flags.push(RowFlag {
                    row,
                    errors: vec![ValidationError::UnreadableRow {
                        reason: e.to_string(),
                    }],
                }),
            }
        }

        if !flags.is_empty() {
            warn!("Flagged {} malformed rows", flags.len());
        }

        let records: Vec<Record> = accepted.iter().map(|(_, r, _)| r.clone()).collect();
        let engineered = self.model.engineer().engineer_batch(&records);
        let vectors = engineered
            .iter()
            .map(|e| self.model.normalizer().normalize(e))
            .collect::<Result<Vec<_>, _>>()?;
        let predictions = self.model.adapter().predict_batch(&vectors)?;

        let results: Vec<RowPrediction> = accepted
            .into_iter()
            .zip(predictions)
            .map(|((row, record, cells), prediction)| RowPrediction {
                row,
                record,
                cells,
                prediction,
            })
            .collect();
        let evaluation = Evaluation::from_results(&results);

        info!(
            "Batch complete: {} predicted, {} flagged",
            results.len(),
            flags.len()
        );
        Ok(BatchReport {
            columns: table.columns,
            results,
            flags,
            evaluation,
        })
    }
}
