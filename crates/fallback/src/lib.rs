//! Fallback Values
//!
//! Provides reference-dataset medians used when a request leaves optional
//! inputs unfilled.

mod defaults;

pub use defaults::{DefaultValueProvider, DefaultValueTable};

use thiserror::Error;

/// Errors while computing fallback values
#[derive(Debug, Clone, Error)]
pub enum FallbackError {
    /// Reference dataset missing or unreadable
    #[error("Reference data unavailable: {0}")]
    DataUnavailable(String),
}
