//! Feature Schema Implementation

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fitted standardization parameters for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Training-set mean
    pub mean: f64,
    /// Training-set standard deviation (never zero)
    pub std: f64,
}

impl ScalerParams {
    /// Build parameters from raw fitted statistics.
    ///
    /// A constant feature has zero spread; it is scaled by 1.0 instead.
    pub fn fitted(mean: f64, std: f64) -> Self {
        let std = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        Self { mean, std }
    }

    /// Standardize a value: `(x - mean) / std`
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct SchemaRepr {
    features: Vec<String>,
    scaler: Vec<ScalerParams>,
}

/// Ordered feature contract of a trained classifier.
///
/// Immutable once built: the order of `features` is the column order the
/// classifier was fitted on, and `scaler[i]` belongs to `features[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaRepr", into = "SchemaRepr")]
pub struct FeatureSchema {
    features: Vec<String>,
    scaler: Vec<ScalerParams>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Create a validated schema
    pub fn new(features: Vec<String>, scaler: Vec<ScalerParams>) -> Result<Self, SchemaError> {
        if features.is_empty() {
            return Err(SchemaError::Invalid("schema has no features".to_string()));
        }
        if features.len() != scaler.len() {
            return Err(SchemaError::Invalid(format!(
                "{} features but {} scaler entries",
                features.len(),
                scaler.len()
            )));
        }

        let mut index = HashMap::with_capacity(features.len());
        for (i, name) in features.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::Invalid(format!("duplicate feature: {}", name)));
            }
        }

        for (name, params) in features.iter().zip(&scaler) {
            if !params.mean.is_finite() || !params.std.is_finite() || params.std <= 0.0 {
                return Err(SchemaError::Invalid(format!(
                    "unusable scaler for {}: mean={}, std={}",
                    name, params.mean, params.std
                )));
            }
        }

        Ok(Self {
            features,
            scaler,
            index,
        })
    }

    /// Feature names in classifier column order
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Column position of a feature
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fitted scaler for a feature
    pub fn scaler(&self, name: &str) -> Option<&ScalerParams> {
        self.position(name).map(|i| &self.scaler[i])
    }

    /// Iterate `(name, scaler)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalerParams)> {
        self.features.iter().map(String::as_str).zip(self.scaler.iter())
    }

    /// Fail unless every named feature is part of the schema
    pub fn require<'a, I>(&self, names: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing: Vec<&str> = names.into_iter().filter(|n| !self.contains(n)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::SchemaMismatch(format!(
                "schema lacks required features: {}",
                missing.join(", ")
            )))
        }
    }
}

impl TryFrom<SchemaRepr> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(repr: SchemaRepr) -> Result<Self, Self::Error> {
        FeatureSchema::new(repr.features, repr.scaler)
    }
}

impl From<FeatureSchema> for SchemaRepr {
    fn from(schema: FeatureSchema) -> Self {
        SchemaRepr {
            features: schema.features,
            scaler: schema.scaler,
        }
    }
}
