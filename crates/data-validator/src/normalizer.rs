//! Z-Score Normalization with Fitted Statistics

use crate::error::ValidationError;
use feature_engine::{EngineeredRecord, FeatureEngineer};
use feature_schema::FeatureSchema;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Standardized feature values keyed by name, in the order they were produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamedVector {
    values: Vec<(String, f64)>,
}

impl NamedVector {
    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for NamedVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Applies the persisted `(x - mean) / std` transform.
///
/// Statistics come from the schema only; nothing here is ever refit on
/// inference data.
#[derive(Debug, Clone)]
pub struct Normalizer {
    schema: Arc<FeatureSchema>,
    produced: HashSet<String>,
}

impl Normalizer {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self {
            schema,
            produced: FeatureEngineer::new().produced_features().into_iter().collect(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Normalize one engineered record.
    ///
    /// Features with fitted statistics are standardized. A feature the
    /// engineer always produces but the schema has no statistic for is a
    /// schema mismatch; any other unknown column is dropped.
    pub fn normalize(&self, features: &EngineeredRecord) -> Result<NamedVector, ValidationError> {
        let mut out = NamedVector::default();
        let mut unfitted = Vec::new();

        for (name, value) in features.iter() {
            match self.schema.scaler(name) {
                Some(params) => out.push(name, params.apply(value)),
                None if self.produced.contains(name) => unfitted.push(name.to_string()),
                None => debug!("Dropping column {} unknown to the schema", name),
            }
        }

        if !unfitted.is_empty() {
            return Err(ValidationError::SchemaMismatch {
                reason: format!("no fitted statistics for {}", unfitted.join(", ")),
            });
        }
        Ok(out)
    }
}
