//! Versioned Model Artifact
//!
//! Layout: `ArtifactHeader { magic, format_version }` followed by the
//! `ArtifactBody`, both postcard-encoded. The header is decoded and checked
//! on its own before the body is touched, so a reader never misinterprets a
//! body written by a different format version.

use crate::{FeatureSchema, SchemaError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Leading bytes of every artifact
pub const ARTIFACT_MAGIC: [u8; 4] = *b"KOIM";

/// Current artifact layout version
pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactHeader {
    magic: [u8; 4],
    format_version: u32,
}

#[derive(Serialize, Deserialize)]
struct ArtifactBody {
    schema: FeatureSchema,
    classifier: Vec<u8>,
}

/// Everything inference needs from training, persisted as one file
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    /// Ordered features and their scaler statistics
    pub schema: FeatureSchema,
    /// Serialized classifier, decoded by the inference engine
    pub classifier: Vec<u8>,
}

impl ModelArtifact {
    pub fn new(schema: FeatureSchema, classifier: Vec<u8>) -> Self {
        Self { schema, classifier }
    }

    /// Encode with the current format version
    pub fn to_bytes(&self) -> Result<Vec<u8>, SchemaError> {
        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
        };
        let body = ArtifactBody {
            schema: self.schema.clone(),
            classifier: self.classifier.clone(),
        };

        let mut bytes = postcard::to_allocvec(&header)
            .map_err(|e| SchemaError::Invalid(format!("header encoding failed: {}", e)))?;
        let body_bytes = postcard::to_allocvec(&body)
            .map_err(|e| SchemaError::Invalid(format!("body encoding failed: {}", e)))?;
        bytes.extend_from_slice(&body_bytes);
        Ok(bytes)
    }

    /// Decode, refusing any other format version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let (header, rest) = postcard::take_from_bytes::<ArtifactHeader>(bytes)
            .map_err(|e| {
                SchemaError::DataUnavailable(format!("unreadable artifact header: {}", e))
            })?;

        if header.magic != ARTIFACT_MAGIC {
            return Err(SchemaError::DataUnavailable(
                "not a model artifact (bad magic)".to_string(),
            ));
        }
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(SchemaError::SchemaMismatch(format!(
                "artifact format version {} is not supported (expected {})",
                header.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }

        let body: ArtifactBody = postcard::from_bytes(rest)
            .map_err(|e| SchemaError::DataUnavailable(format!("corrupt artifact body: {}", e)))?;

        debug!(
            "Decoded artifact: {} features, {} classifier bytes",
            body.schema.len(),
            body.classifier.len()
        );
        Ok(Self {
            schema: body.schema,
            classifier: body.classifier,
        })
    }

    /// Load an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        info!("Loading model artifact from {}", path.display());
        let bytes = fs::read(path).map_err(|e| {
            SchemaError::DataUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Write an artifact to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes).map_err(|e| {
            SchemaError::DataUnavailable(format!("cannot write {}: {}", path.display(), e))
        })?;
        info!("Saved model artifact ({} bytes) to {}", bytes.len(), path.display());
        Ok(())
    }
}
