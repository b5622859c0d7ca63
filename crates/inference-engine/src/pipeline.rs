//! Prediction Service
//!
//! Owns the two process-wide read-only caches (the loaded model and the
//! default value table). Both are loaded on first use, or eagerly through
//! `warm_up`, and are shared without locks afterwards.

use crate::batcher::{BatchPredictor, BatchReport};
use crate::classifier::{Classifier, VotingEnsemble};
use crate::engine::{InferenceAdapter, PredictionResult, DEFAULT_DECISION_THRESHOLD};
use crate::InferenceError;
use data_validator::{Normalizer, ValidationError, Validator};
use fallback::{DefaultValueProvider, DefaultValueTable};
use feature_engine::{FeatureEngineer, Imputation};
use feature_schema::{FeatureSchema, ModelArtifact};
use koi_record::columns::REQUIRED_FIELDS;
use koi_record::{read_csv, Record};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Where the service finds its artifacts
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Versioned model artifact (schema + classifier)
    pub artifact_path: PathBuf,
    /// Reference dataset for default values
    pub reference_path: PathBuf,
    pub decision_threshold: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("models/koi_ensemble.koim"),
            reference_path: PathBuf::from("data/Kepler.csv"),
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }
}

/// A schema/classifier pairing checked against the feature engineer
pub struct LoadedModel {
    schema: Arc<FeatureSchema>,
    engineer: FeatureEngineer,
    validator: Validator,
    normalizer: Normalizer,
    adapter: InferenceAdapter,
    /// Raw (not engineered) schema columns, filled from defaults when absent
    raw_features: Vec<String>,
}

impl LoadedModel {
    /// Pair a schema with a classifier.
    ///
    /// Fails with a schema mismatch when the schema lacks any feature the
    /// engineer produces, or the classifier width differs from the schema.
    pub fn new(
        schema: FeatureSchema,
        classifier: Arc<dyn Classifier>,
        threshold: f64,
    ) -> Result<Self, InferenceError> {
        let engineer = FeatureEngineer::new();
        let produced = engineer.produced_features();
        schema.require(produced.iter().map(String::as_str))?;

        let schema = Arc::new(schema);
        let raw_features: Vec<String> = schema
            .features()
            .iter()
            .filter(|f| !produced.contains(f))
            .cloned()
            .collect();
        let validator = Validator::new(
            raw_features
                .iter()
                .cloned()
                .chain(REQUIRED_FIELDS.iter().map(|f| f.to_string())),
        );
        let adapter = InferenceAdapter::new(schema.clone(), classifier, threshold)?;

        Ok(Self {
            normalizer: Normalizer::new(schema.clone()),
            schema,
            engineer,
            validator,
            adapter,
            raw_features,
        })
    }

    /// Decode a model artifact backed by the voting ensemble
    pub fn from_artifact(artifact: ModelArtifact, threshold: f64) -> Result<Self, InferenceError> {
        let classifier = VotingEnsemble::from_bytes(&artifact.classifier)?;
        Self::new(artifact.schema, Arc::new(classifier), threshold)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn engineer(&self) -> &FeatureEngineer {
        &self.engineer
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn adapter(&self) -> &InferenceAdapter {
        &self.adapter
    }

    /// Single-record path: reference medians fill every gap
    pub fn predict_record(
        &self,
        record: &Record,
        defaults: &DefaultValueTable,
    ) -> Result<PredictionResult, InferenceError> {
        self.validator.validate_required(record, &REQUIRED_FIELDS)?;

        let imputation = Imputation::Reference {
            medians: defaults.medians(),
            expected: &self.raw_features,
        };
        let engineered = self.engineer.engineer(record, &imputation);
        let vector = self.normalizer.normalize(&engineered)?;
        let result = self.adapter.predict(&vector)?;

        debug!(
            "Single prediction: {} ({:?}, p_confirmed={:.3})",
            result.label,
            result.decision,
            result.p_confirmed()
        );
        Ok(result)
    }
}

/// Lazily-initialized, shareable prediction service
pub struct PredictionService {
    settings: ServiceSettings,
    model: OnceLock<Arc<LoadedModel>>,
    defaults: DefaultValueProvider,
}

impl PredictionService {
    /// Service loading its artifacts from the configured paths on first use
    pub fn new(settings: ServiceSettings) -> Self {
        Self {
            defaults: DefaultValueProvider::from_path(settings.reference_path.clone()),
            settings,
            model: OnceLock::new(),
        }
    }

    /// Service around an already-loaded model and default value provider
    pub fn with_model(model: LoadedModel, defaults: DefaultValueProvider) -> Self {
        let service = Self {
            settings: ServiceSettings::default(),
            model: OnceLock::new(),
            defaults,
        };
        let _ = service.model.set(Arc::new(model));
        service
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// The loaded model, reading the artifact on first call
    pub fn model(&self) -> Result<Arc<LoadedModel>, InferenceError> {
        if let Some(model) = self.model.get() {
            return Ok(model.clone());
        }
        let artifact = ModelArtifact::load(&self.settings.artifact_path)?;
        let model = Arc::new(LoadedModel::from_artifact(
            artifact,
            self.settings.decision_threshold,
        )?);
        Ok(self.model.get_or_init(|| model).clone())
    }

    pub fn defaults(&self) -> Result<&DefaultValueTable, InferenceError> {
        Ok(self.defaults.defaults()?)
    }

    /// Load both caches now instead of on the first request
    pub fn warm_up(&self) -> Result<(), InferenceError> {
        let model = self.model()?;
        let defaults = self.defaults()?;
        info!(
            "Prediction service warm: {} schema features, {} default values",
            model.schema().len(),
            defaults.medians().len()
        );
        Ok(())
    }

    pub fn is_warm(&self) -> bool {
        self.model.get().is_some() && self.defaults.is_loaded()
    }

    /// Classify one form-filled record
    pub fn predict_record(&self, record: &Record) -> Result<PredictionResult, InferenceError> {
        let model = self.model()?;
        let defaults = self.defaults()?;
        model.predict_record(record, defaults)
    }

    /// Classify every row of an uploaded CSV
    pub fn predict_csv<R: Read>(&self, reader: R) -> Result<BatchReport, InferenceError> {
        let model = self.model()?;
        let table = read_csv(reader).map_err(|e| {
            InferenceError::MalformedInput(vec![ValidationError::UnreadableRow {
                reason: e.to_string(),
            }])
        })?;
        BatchPredictor::new(&model).run(table)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::Member;
    use crate::engine::Decision;
    use feature_engine::SchemaFitter;
    use koi_record::{Disposition, Value};
    use proptest::prelude::*;

    const DR24: &str = "q1_q17_dr24_tce";
    const Q16: &str = "q1_q16_tce";

    pub(crate) fn reference_records() -> Vec<Record> {
        let rows = [
            ("CONFIRMED", 2.9575, 615.8, 5455.0, 4.467, 9.488, 2.26, 93.59, 0.927, DR24),
            ("CONFIRMED", 4.507, 874.8, 5455.0, 4.467, 54.418, 2.83, 9.11, 0.927, DR24),
            ("CANDIDATE", 1.7822, 10829.0, 5853.0, 4.544, 19.899, 14.6, 39.3, 0.868, Q16),
            ("CANDIDATE", 2.4065, 8079.2, 5805.0, 4.564, 1.7369, 33.46, 2600.0, 0.791, DR24),
            ("CONFIRMED", 1.6545, 603.3, 6031.0, 4.438, 2.5259, 2.75, 3.67, 1.046, DR24),
            ("CANDIDATE", 3.1, 1500.0, 5200.0, 4.5, 11.1, 3.9, 120.0, 0.8, Q16),
        ];
        rows.iter()
            .enumerate()
            .map(|(i, (label, duration, depth, steff, slogg, period, prad, insol, srad, deliv))| {
                let mut r = Record::new();
                r.insert("kepid", i as f64);
                r.insert("kepoi_name", format!("K{:05}.01", i).as_str());
                r.insert("koi_disposition", *label);
                r.insert("koi_duration", *duration);
                r.insert("koi_depth", *depth);
                r.insert("koi_steff", *steff);
                r.insert("koi_slogg", *slogg);
                r.insert("koi_period", *period);
                r.insert("koi_prad", *prad);
                r.insert("koi_insol", *insol);
                r.insert("koi_srad", *srad);
                r.insert("koi_tce_delivname", *deliv);
                r
            })
            .collect()
    }

    /// Model fitted on the reference records with a small hand-built ensemble
    pub(crate) fn fitted_model(threshold: f64) -> LoadedModel {
        let schema = SchemaFitter::new().fit(&reference_records()).unwrap();
        let width = schema.len();
        let depth_ratio = schema.position("depth_duration_ratio").unwrap();

        let mut coefficients = vec![0.0; width];
        coefficients[depth_ratio] = -1.5;
        let ensemble = VotingEnsemble::new(
            width,
            vec![
                (
                    2.0,
                    Member::Logistic {
                        coefficients,
                        intercept: 0.2,
                    },
                ),
                (
                    1.0,
                    Member::Tree(
                        crate::classifier::DecisionTree::new(vec![
                            crate::classifier::TreeNode::Split {
                                feature: depth_ratio,
                                threshold: 0.0,
                                left: 1,
                                right: 2,
                            },
                            crate::classifier::TreeNode::Leaf { p_confirmed: 0.8 },
                            crate::classifier::TreeNode::Leaf { p_confirmed: 0.1 },
                        ])
                        .unwrap(),
                    ),
                ),
            ],
        )
        .unwrap();

        let artifact = ModelArtifact::new(schema, ensemble.to_bytes().unwrap());
        LoadedModel::from_artifact(artifact, threshold).unwrap()
    }

    fn service() -> PredictionService {
        PredictionService::with_model(
            fitted_model(DEFAULT_DECISION_THRESHOLD),
            DefaultValueProvider::from_records(reference_records()),
        )
    }

    fn required_only() -> Record {
        [
            ("koi_duration", 3.5),
            ("koi_depth", 500.0),
            ("koi_steff", 5800.0),
            ("koi_slogg", 4.4),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_required_fields_only_completes() {
        let result = service().predict_record(&required_only()).unwrap();
        assert!(matches!(result.label, Disposition::Candidate | Disposition::Confirmed));
        assert!((result.probabilities[0] + result.probabilities[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_low_depth_ratio_confirms() {
        let result = service().predict_record(&required_only()).unwrap();
        // 500 / 3.5 is far below the reference mean depth ratio
        assert_eq!(result.decision, Decision::Confirmed);
    }

    #[test]
    fn test_column_order_invariance() {
        let service = service();
        let forward = required_only();
        let mut backward = Record::new();
        let cells: Vec<(String, Value)> = forward
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        for (k, v) in cells.into_iter().rev() {
            backward.insert(k, v);
        }

        assert_eq!(
            service.predict_record(&forward).unwrap(),
            service.predict_record(&backward).unwrap()
        );
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let mut record = required_only();
        record.remove("koi_slogg");
        let err = service().predict_record(&record).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }

    #[test]
    fn test_text_in_numeric_field_is_malformed() {
        let mut record = required_only();
        record.insert("koi_period", "soon");
        let err = service().predict_record(&record).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedInput(_)));
    }

    #[test]
    fn test_schema_lacking_engineered_feature_is_mismatch() {
        let full = SchemaFitter::new().fit(&reference_records()).unwrap();
        let kept: Vec<(String, feature_schema::ScalerParams)> = full
            .iter()
            .filter(|(name, _)| *name != "insol_prad_ratio")
            .map(|(name, params)| (name.to_string(), *params))
            .collect();
        let (names, scaler): (Vec<_>, Vec<_>) = kept.into_iter().unzip();
        let truncated = FeatureSchema::new(names, scaler).unwrap();
        let width = truncated.len();

        let ensemble = VotingEnsemble::new(
            width,
            vec![(
                1.0,
                Member::Logistic {
                    coefficients: vec![0.0; width],
                    intercept: 0.0,
                },
            )],
        )
        .unwrap();

        let result = LoadedModel::new(truncated, Arc::new(ensemble), DEFAULT_DECISION_THRESHOLD);
        assert!(matches!(result, Err(InferenceError::SchemaMismatch(_))));
    }

    #[test]
    fn test_lazy_loading_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let artifact_path = dir.path().join("model.koim");
        let reference_path = dir.path().join("Kepler.csv");

        let schema = SchemaFitter::new().fit(&reference_records()).unwrap();
        let width = schema.len();
        let ensemble = VotingEnsemble::new(
            width,
            vec![(
                1.0,
                Member::Logistic {
                    coefficients: vec![0.1; width],
                    intercept: 0.0,
                },
            )],
        )
        .unwrap();
        ModelArtifact::new(schema, ensemble.to_bytes().unwrap())
            .save(&artifact_path)
            .unwrap();
        std::fs::write(
            &reference_path,
            "koi_duration,koi_depth,koi_steff,koi_slogg,koi_srad\n3.0,600,5500,4.4,1.0\n",
        )
        .unwrap();

        let service = PredictionService::new(ServiceSettings {
            artifact_path,
            reference_path,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
        });
        assert!(!service.is_warm());
        service.warm_up().unwrap();
        assert!(service.is_warm());
        assert!(service.predict_record(&required_only()).is_ok());
    }

    #[test]
    fn test_missing_artifact_is_data_unavailable() {
        let service = PredictionService::new(ServiceSettings {
            artifact_path: PathBuf::from("/no/model.koim"),
            ..ServiceSettings::default()
        });
        let err = service.predict_record(&required_only()).unwrap_err();
        assert_eq!(err.kind(), "data_unavailable");
    }

    fn reference_table() -> DefaultValueTable {
        DefaultValueTable::from_records(&reference_records()).unwrap()
    }

    fn duration_strategy() -> impl Strategy<Value = f64> {
        prop_oneof![Just(0.0), 0.0f64..48.0]
    }

    fn depth_strategy() -> impl Strategy<Value = f64> {
        prop_oneof![0.0f64..2e4, 2e4f64..1e9]
    }

    proptest! {
        #[test]
        fn prop_required_fields_only_always_completes(
            duration in duration_strategy(),
            depth in depth_strategy(),
            steff in 2000.0f64..50000.0,
            slogg in 0.0f64..6.0,
        ) {
            let model = fitted_model(DEFAULT_DECISION_THRESHOLD);
            let record: Record = [
                ("koi_duration", duration),
                ("koi_depth", depth),
                ("koi_steff", steff),
                ("koi_slogg", slogg),
            ]
            .into_iter()
            .collect();

            let result = model.predict_record(&record, &reference_table()).unwrap();
            prop_assert!(matches!(result.label, Disposition::Candidate | Disposition::Confirmed));
            prop_assert!((result.p_candidate() + result.p_confirmed() - 1.0).abs() < 1e-6);
        }

        #[test]
        fn prop_field_order_never_changes_prediction(
            cells in Just(vec![
                ("koi_duration", Value::Number(2.4)),
                ("koi_depth", Value::Number(874.8)),
                ("koi_steff", Value::Number(5455.0)),
                ("koi_slogg", Value::Number(4.467)),
                ("koi_period", Value::Number(54.4)),
                ("koi_prad", Value::Number(2.83)),
                ("koi_insol", Value::Missing),
                ("koi_srad", Value::Number(0.927)),
                ("koi_tce_delivname", Value::from("q1_q16_tce")),
                ("kepoi_name", Value::from("K00752.02")),
            ])
            .prop_shuffle(),
        ) {
            let model = fitted_model(DEFAULT_DECISION_THRESHOLD);
            let defaults = reference_table();

            let mut sorted = cells.clone();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let canonical: Record = sorted.into_iter().collect();
            let shuffled: Record = cells.into_iter().collect();

            prop_assert_eq!(
                model.predict_record(&canonical, &defaults).unwrap(),
                model.predict_record(&shuffled, &defaults).unwrap()
            );
        }
    }
}
