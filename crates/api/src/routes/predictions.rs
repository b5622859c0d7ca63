//! Prediction Routes

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};
use data_validator::ValidationError;
use inference_engine::{
    BatchReport, Evaluation, InferenceError, PredictionResult, PredictionService, RowFlag,
};
use koi_record::Record;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

/// One classified row of a batch upload
#[derive(Debug, Serialize)]
pub struct RowSummary {
    pub row: usize,
    /// Catalog name when the upload carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kepoi_name: Option<String>,
    #[serde(flatten)]
    pub prediction: PredictionResult,
}

/// Response for the batch endpoint
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub total_rows: usize,
    pub predicted: usize,
    pub flagged: usize,
    pub results: Vec<RowSummary>,
    pub flags: Vec<RowFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl From<BatchReport> for BatchResponse {
    fn from(report: BatchReport) -> Self {
        let total_rows = report.total_rows();
        let results: Vec<RowSummary> = report
            .results
            .into_iter()
            .map(|r| RowSummary {
                row: r.row,
                kepoi_name: r
                    .record
                    .get("kepoi_name")
                    .and_then(|v| v.as_text())
                    .map(str::to_string),
                prediction: r.prediction,
            })
            .collect();

        Self {
            total_rows,
            predicted: results.len(),
            flagged: report.flags.len(),
            results,
            flags: report.flags,
            evaluation: report.evaluation,
        }
    }
}

/// Run blocking pipeline work off the async executor
async fn run_blocking<T, F>(service: Arc<PredictionService>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&PredictionService) -> Result<T, InferenceError> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || work(&service))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {}", e)))?;

    if let Err(InferenceError::MalformedInput(errors)) = &outcome {
        counter!("koi_malformed_rows_total").increment(errors.len().max(1) as u64);
    }
    Ok(outcome?)
}

fn record_predictions<'a>(predictions: impl Iterator<Item = &'a PredictionResult>) {
    for p in predictions {
        counter!("koi_predictions_total", "label" => p.label.as_str()).increment(1);
    }
}

fn record_batch(report: &BatchReport) {
    record_predictions(report.results.iter().map(|r| &r.prediction));
    if !report.flags.is_empty() {
        counter!("koi_malformed_rows_total").increment(report.flags.len() as u64);
    }
}

/// A request body that cannot be read as a record is malformed input
fn unreadable_body(rejection: JsonRejection) -> ApiError {
    counter!("koi_malformed_rows_total").increment(1);
    ApiError::from(InferenceError::MalformedInput(vec![
        ValidationError::UnreadableRow {
            reason: rejection.body_text(),
        },
    ]))
}

/// Classify a single form-filled record
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Record>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(record) = payload.map_err(unreadable_body)?;
    let result = run_blocking(state.service.clone(), move |service| {
        service.predict_record(&record)
    })
    .await?;
    record_predictions(std::iter::once(&result));
    Ok(Json(result))
}

/// Classify every row of an uploaded CSV
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    let report = run_blocking(state.service.clone(), move |service| {
        service.predict_csv(body.as_ref())
    })
    .await?;
    record_batch(&report);
    info!(
        "Batch request: {} rows, {} flagged",
        report.total_rows(),
        report.flags.len()
    );
    Ok(Json(BatchResponse::from(report)))
}

/// Classify an uploaded CSV and return it with prediction columns appended
pub async fn export_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (report, csv) = run_blocking(state.service.clone(), move |service| {
        let report = service.predict_csv(body.as_ref())?;
        let mut csv = Vec::new();
        report.write_csv(&mut csv)?;
        Ok((report, csv))
    })
    .await?;
    record_batch(&report);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"koi_predictions.csv\"",
            ),
        ],
        csv,
    ))
}
