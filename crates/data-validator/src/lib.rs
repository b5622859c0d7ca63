//! Data Validation and Normalization
//!
//! Provides per-record type checks ahead of feature engineering, and
//! standardization with the scaler statistics persisted in the schema.

mod error;
mod normalizer;
mod validator;

pub use error::ValidationError;
pub use normalizer::{NamedVector, Normalizer};
pub use validator::Validator;
