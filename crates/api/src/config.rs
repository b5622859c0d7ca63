//! Service Configuration
//!
//! Layered: built-in defaults, then an optional `koi.toml`, then `KOI_*`
//! environment variables.

use config::{Config, ConfigError, Environment, File};
use inference_engine::{ServiceSettings, DEFAULT_DECISION_THRESHOLD};
use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration of the prediction server
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Listen address
    pub bind_addr: String,
    /// Versioned model artifact
    pub artifact_path: PathBuf,
    /// Reference dataset for default values
    pub reference_path: PathBuf,
    /// P(CONFIRMED) required to accept a CONFIRMED vote, in (0, 1]
    pub decision_threshold: f64,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let settings = ServiceSettings::default();
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            artifact_path: settings.artifact_path,
            reference_path: settings.reference_path,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            json_logs: false,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Load from `koi.toml` in the working directory and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("koi")
    }

    /// Load from the given file stem (any format `config` understands) and
    /// the environment. A missing file is not an error.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Config::builder()
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("artifact_path", defaults.artifact_path.to_string_lossy().into_owned())?
            .set_default("reference_path", defaults.reference_path.to_string_lossy().into_owned())?
            .set_default("decision_threshold", defaults.decision_threshold)?
            .set_default("json_logs", defaults.json_logs)?
            .set_default("max_upload_bytes", defaults.max_upload_bytes as u64)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("KOI").try_parsing(true))
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decision_threshold > 0.0 && self.decision_threshold <= 1.0) {
            return Err(ConfigError::Message(format!(
                "decision_threshold {} outside (0, 1]",
                self.decision_threshold
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Message("max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Paths and threshold handed to the prediction service
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            artifact_path: self.artifact_path.clone(),
            reference_path: self.reference_path.clone(),
            decision_threshold: self.decision_threshold,
        }
    }
}
