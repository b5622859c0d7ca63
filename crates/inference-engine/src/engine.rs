//! Inference Adapter Implementation

use crate::classifier::Classifier;
use crate::InferenceError;
use data_validator::NamedVector;
use feature_schema::FeatureSchema;
use koi_record::Disposition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Positive-class probability required to accept a CONFIRMED vote
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.55;

/// How the final label was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Classifier voted CONFIRMED with probability at or above the threshold
    Confirmed,
    /// Classifier voted CONFIRMED below the threshold; reported as CANDIDATE
    BelowThreshold,
    /// Classifier voted CANDIDATE
    Candidate,
}

impl Decision {
    pub fn label(&self) -> Disposition {
        match self {
            Decision::Confirmed => Disposition::Confirmed,
            Decision::BelowThreshold | Decision::Candidate => Disposition::Candidate,
        }
    }
}

/// Outcome of classifying one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Final label after thresholding
    pub label: Disposition,
    pub decision: Decision,
    /// `[P(CANDIDATE), P(CONFIRMED)]`, summing to 1
    pub probabilities: [f64; 2],
    /// Probability of the final label
    pub confidence: f64,
}

impl PredictionResult {
    pub fn p_candidate(&self) -> f64 {
        self.probabilities[0]
    }

    pub fn p_confirmed(&self) -> f64 {
        self.probabilities[1]
    }
}

/// Aligns normalized features with the schema and runs the classifier
pub struct InferenceAdapter {
    schema: Arc<FeatureSchema>,
    classifier: Arc<dyn Classifier>,
    threshold: f64,
}

impl InferenceAdapter {
    /// Create an adapter; the classifier must accept exactly the schema's width
    pub fn new(
        schema: Arc<FeatureSchema>,
        classifier: Arc<dyn Classifier>,
        threshold: f64,
    ) -> Result<Self, InferenceError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(InferenceError::InferenceFailed(format!(
                "decision threshold {} outside (0, 1]",
                threshold
            )));
        }
        if classifier.n_features() != schema.len() {
            return Err(InferenceError::SchemaMismatch(format!(
                "classifier expects {} features, schema has {}",
                classifier.n_features(),
                schema.len()
            )));
        }
        info!(
            "Inference adapter ready: {} features, threshold {}",
            schema.len(),
            threshold
        );
        Ok(Self {
            schema,
            classifier,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Place each value at its schema position. Columns unknown to the
    /// schema are dropped; schema columns absent from the vector stay 0.0,
    /// the training mean in standardized space.
    pub fn reindex(&self, vector: &NamedVector) -> Vec<f64> {
        let mut row = vec![0.0; self.schema.len()];
        for (name, value) in vector.iter() {
            match self.schema.position(name) {
                Some(i) => row[i] = value,
                None => debug!("Reindex dropped column {}", name),
            }
        }
        row
    }

    /// Classify one record
    pub fn predict(&self, vector: &NamedVector) -> Result<PredictionResult, InferenceError> {
        self.predict_batch(std::slice::from_ref(vector))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                InferenceError::InferenceFailed("classifier returned no rows".to_string())
            })
    }

    /// Classify a batch with a single call to each classifier operation
    pub fn predict_batch(
        &self,
        vectors: &[NamedVector],
    ) -> Result<Vec<PredictionResult>, InferenceError> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| self.reindex(v)).collect();
        let labels = self.classifier.predict_labels(&rows)?;
        let probabilities = self.classifier.predict_proba(&rows)?;

        if labels.len() != rows.len() || probabilities.len() != rows.len() {
            return Err(InferenceError::InferenceFailed(format!(
                "classifier returned {} labels and {} probability rows for {} inputs",
                labels.len(),
                probabilities.len(),
                rows.len()
            )));
        }

        labels
            .into_iter()
            .zip(probabilities)
            .map(|(label, proba)| self.decide(label, proba))
            .collect()
    }

    /// Apply the decision threshold to a raw classifier vote
    pub fn decide(
        &self,
        raw: Disposition,
        proba: [f64; 2],
    ) -> Result<PredictionResult, InferenceError> {
        let p_confirmed = confirmed_probability(proba)?;
        let probabilities = [1.0 - p_confirmed, p_confirmed];

        let decision = match raw {
            Disposition::Confirmed if p_confirmed >= self.threshold => Decision::Confirmed,
            Disposition::Confirmed => Decision::BelowThreshold,
            Disposition::Candidate => Decision::Candidate,
        };
        let label = decision.label();

        Ok(PredictionResult {
            label,
            decision,
            probabilities,
            confidence: probabilities[label.index()],
        })
    }
}

/// P(CONFIRMED) from a raw pair, renormalised when the pair does not sum to 1
fn confirmed_probability(proba: [f64; 2]) -> Result<f64, InferenceError> {
    let [p0, p1] = proba;
    if !p0.is_finite() || !p1.is_finite() || p0 < 0.0 || p1 < 0.0 {
        return Err(InferenceError::InferenceFailed(format!(
            "invalid probabilities {:?}",
            proba
        )));
    }
    let sum = p0 + p1;
    if sum <= 0.0 {
        return Err(InferenceError::InferenceFailed("probabilities sum to zero".to_string()));
    }
    let p = if (sum - 1.0).abs() <= 1e-9 { p1 } else { p1 / sum };
    Ok(p.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_schema::ScalerParams;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed P(CONFIRMED), voting CONFIRMED when it exceeds 0.5,
    /// and echoes the rows it saw
    struct FixedClassifier {
        width: usize,
        p: f64,
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<Vec<f64>>>,
    }

    impl FixedClassifier {
        fn new(width: usize, p: f64) -> Self {
            Self {
                width,
                p,
                calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn n_features(&self) -> usize {
            self.width
        }

        fn predict_labels(&self, batch: &[Vec<f64>]) -> Result<Vec<Disposition>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(batch.iter().cloned());
            let label = if self.p > 0.5 {
                Disposition::Confirmed
            } else {
                Disposition::Candidate
            };
            Ok(vec![label; batch.len()])
        }

        fn predict_proba(&self, batch: &[Vec<f64>]) -> Result<Vec<[f64; 2]>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![[1.0 - self.p, self.p]; batch.len()])
        }
    }

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(
            FeatureSchema::new(
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                vec![ScalerParams::fitted(0.0, 1.0); 3],
            )
            .unwrap(),
        )
    }

    fn adapter(p: f64) -> (InferenceAdapter, Arc<FixedClassifier>) {
        let classifier = Arc::new(FixedClassifier::new(3, p));
        let adapter =
            InferenceAdapter::new(schema(), classifier.clone(), DEFAULT_DECISION_THRESHOLD)
                .unwrap();
        (adapter, classifier)
    }

    #[test]
    fn test_reindex_orders_drops_and_pads() {
        let (adapter, _) = adapter(0.9);
        let vector: NamedVector = [("c", 3.0), ("extra", 9.0), ("a", 1.0)].into_iter().collect();
        assert_eq!(adapter.reindex(&vector), vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_threshold_boundary_is_confirmed() {
        let (adapter, _) = adapter(0.55);
        let result = adapter.predict(&NamedVector::default()).unwrap();
        assert_eq!(result.label, Disposition::Confirmed);
        assert_eq!(result.decision, Decision::Confirmed);
        assert_eq!(result.confidence, 0.55);
    }

    #[test]
    fn test_just_below_threshold_is_downgraded() {
        let (adapter, _) = adapter(0.549999);
        let result = adapter.predict(&NamedVector::default()).unwrap();
        assert_eq!(result.label, Disposition::Candidate);
        assert_eq!(result.decision, Decision::BelowThreshold);
    }

    #[test]
    fn test_negative_vote() {
        let (adapter, _) = adapter(0.2);
        let result = adapter.predict(&NamedVector::default()).unwrap();
        assert_eq!(result.decision, Decision::Candidate);
        assert!((result.confidence - 0.8).abs() < 1e-12);
        assert!((result.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_batch_invokes_classifier_once() {
        let (adapter, classifier) = adapter(0.9);
        let vectors = vec![NamedVector::default(); 5];
        let results = adapter.predict_batch(&vectors).unwrap();

        assert_eq!(results.len(), 5);
        // one label call plus one probability call
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let classifier = Arc::new(FixedClassifier::new(2, 0.5));
        let result = InferenceAdapter::new(schema(), classifier, DEFAULT_DECISION_THRESHOLD);
        assert!(matches!(result, Err(InferenceError::SchemaMismatch(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let classifier = Arc::new(FixedClassifier::new(3, 0.5));
        assert!(InferenceAdapter::new(schema(), classifier, 0.0).is_err());
    }

    #[test]
    fn test_input_order_does_not_change_prediction() {
        let (adapter, classifier) = adapter(0.7);
        let forward: NamedVector = [("a", 1.0), ("b", -2.0), ("c", 0.5)].into_iter().collect();
        let backward: NamedVector = [("c", 0.5), ("b", -2.0), ("a", 1.0)].into_iter().collect();

        let r1 = adapter.predict(&forward).unwrap();
        let r2 = adapter.predict(&backward).unwrap();
        assert_eq!(r1, r2);

        let seen = classifier.seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
    }

    proptest::proptest! {
        #[test]
        fn prop_decision_consistent_with_threshold(p in 0.0f64..=1.0, confirmed_vote: bool) {
            let (adapter, _) = adapter(0.5);
            let raw = if confirmed_vote { Disposition::Confirmed } else { Disposition::Candidate };
            let result = adapter.decide(raw, [1.0 - p, p]).unwrap();

            let total = result.p_candidate() + result.p_confirmed();
            proptest::prop_assert!((total - 1.0).abs() < 1e-9);
            let chosen = result.probabilities[result.label.index()];
            proptest::prop_assert_eq!(result.confidence, chosen);
            if result.label == Disposition::Confirmed {
                proptest::prop_assert!(confirmed_vote);
                proptest::prop_assert!(result.p_confirmed() >= DEFAULT_DECISION_THRESHOLD);
            }
        }
    }
}
