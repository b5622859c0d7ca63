//! Feature Engineering Engine
//!
//! Turns raw KOI records into the engineered feature set the classifier was
//! trained on, and fits the feature schema from a reference dataset.

mod categorical;
mod features;
mod fit;
mod statistics;

pub use categorical::{dummy_columns, expand_delivname};
pub use features::{EngineeredRecord, FeatureEngineer, Imputation, RATIO_EPSILON};
pub use fit::SchemaFitter;
pub use statistics::{ColumnMedians, ColumnStatistics};

use feature_schema::SchemaError;
use thiserror::Error;

/// Errors while fitting features
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Reference dataset has no usable rows")]
    EmptyDataset,
    #[error("Reference dataset cannot produce features: {}", .0.join(", "))]
    MissingInputs(Vec<String>),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
