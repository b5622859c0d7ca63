//! Validation Error Types

use serde::Serialize;
use thiserror::Error;

/// Errors during data validation
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// Non-numeric value in a numeric field
    #[error("{column} must be numeric, got {value:?}")]
    MalformedInput { column: String, value: String },

    /// Missing required field
    #[error("Missing required field: {column}")]
    MissingField { column: String },

    /// Row could not be read at all
    #[error("Unreadable row: {reason}")]
    UnreadableRow { reason: String },

    /// Engineered feature has no fitted statistic
    #[error("Schema mismatch: {reason}")]
    SchemaMismatch { reason: String },
}

impl ValidationError {
    /// Whether the failure lies in the caller's input rather than the
    /// schema/model pairing
    pub fn is_malformed_input(&self) -> bool {
        !matches!(self, ValidationError::SchemaMismatch { .. })
    }
}
