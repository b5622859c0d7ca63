//! Feature Schema
//!
//! The ordered column contract a trained classifier expects, the scaler
//! statistics fitted alongside it, and the versioned artifact that persists
//! both together with the classifier itself.

mod artifact;
mod schema;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION, ARTIFACT_MAGIC};
pub use schema::{FeatureSchema, ScalerParams};

use thiserror::Error;

/// Schema and artifact errors
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Artifact cannot be located or decoded
    #[error("Artifact unavailable: {0}")]
    DataUnavailable(String),
    /// Schema and its consumer disagree on the feature contract
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Schema content violates its own invariants
    #[error("Invalid schema: {0}")]
    Invalid(String),
}
