//! Disposition Inference Engine
//!
//! Aligns normalized features with the schema's column order, runs the
//! persisted classifier and applies the decision threshold. Also hosts the
//! batch path and the lazily-initialized prediction service.

mod batcher;
mod classifier;
mod engine;
mod pipeline;

pub use batcher::{BatchPredictor, BatchReport, Evaluation, RowFlag, RowPrediction};
pub use classifier::{Classifier, DecisionTree, Member, TreeNode, VotingEnsemble};
pub use engine::{Decision, InferenceAdapter, PredictionResult, DEFAULT_DECISION_THRESHOLD};
pub use pipeline::{LoadedModel, PredictionService, ServiceSettings};

use data_validator::ValidationError;
use fallback::FallbackError;
use feature_schema::SchemaError;
use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Reference dataset or model artifact missing or unreadable
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
    /// Schema and classifier or feature engineer disagree
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Request content cannot be coerced to the expected types
    #[error("Malformed input: {}", format_errors(.0))]
    MalformedInput(Vec<ValidationError>),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: usize, actual: usize },
}

impl InferenceError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::DataUnavailable(_) => "data_unavailable",
            InferenceError::SchemaMismatch(_) | InferenceError::InvalidInputShape { .. } => {
                "schema_mismatch"
            }
            InferenceError::MalformedInput(_) => "malformed_input",
            InferenceError::InferenceFailed(_) => "inference_failed",
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<SchemaError> for InferenceError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::DataUnavailable(msg) => InferenceError::DataUnavailable(msg),
            SchemaError::SchemaMismatch(msg) => InferenceError::SchemaMismatch(msg),
            SchemaError::Invalid(msg) => InferenceError::DataUnavailable(msg),
        }
    }
}

impl From<FallbackError> for InferenceError {
    fn from(err: FallbackError) -> Self {
        match err {
            FallbackError::DataUnavailable(msg) => InferenceError::DataUnavailable(msg),
        }
    }
}

impl From<ValidationError> for InferenceError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::SchemaMismatch { reason } => InferenceError::SchemaMismatch(reason),
            other => InferenceError::MalformedInput(vec![other]),
        }
    }
}

impl From<Vec<ValidationError>> for InferenceError {
    fn from(errors: Vec<ValidationError>) -> Self {
        InferenceError::MalformedInput(errors)
    }
}
