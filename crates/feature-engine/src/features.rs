//! Feature Engineering

use crate::categorical::{dummy_columns, expand_delivname};
use crate::statistics::ColumnMedians;
use koi_record::columns::{
    is_excluded, DEPTH_DURATION_RATIO, INSOL_PRAD_RATIO, KOI_DEPTH, KOI_DURATION, KOI_INSOL,
    KOI_PRAD, KOI_SRAD, KOI_STEFF, STELLAR_LUMINOSITY_PROXY,
};
use koi_record::{Record, Value};
use serde::Serialize;
use tracing::debug;

/// Added to ratio denominators so a zero input never divides by zero
pub const RATIO_EPSILON: f64 = 1e-6;

/// Numeric features of one observation after engineering.
///
/// Holds only defined numbers: cells that stayed missing after imputation and
/// leftover text cells are absent, and later stages treat absence as the
/// neutral value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineeredRecord {
    values: Vec<(String, f64)>,
}

impl EngineeredRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(k, _)| k == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
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

    /// Whether two records hold bit-identical values in the same order
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
    }
}

/// Source of fill values for missing numeric cells
#[derive(Debug, Clone, Copy)]
pub enum Imputation<'a> {
    /// Single-record inference: reference-dataset medians. Every column in
    /// `expected` that the record lacks is inserted from the table as well.
    Reference {
        medians: &'a ColumnMedians,
        expected: &'a [String],
    },
    /// Batch inference: medians over the current batch
    Batch(&'a ColumnMedians),
    /// Leave gaps as they are
    None,
}

impl Imputation<'_> {
    fn fill(&self, record: &mut Record) {
        let medians = match self {
            Imputation::Reference { medians, .. } | Imputation::Batch(medians) => *medians,
            Imputation::None => return,
        };

        for (name, value) in record.values_mut() {
            if value.is_missing() {
                if let Some(m) = medians.get(name) {
                    *value = Value::Number(m);
                }
            }
        }

        if let Imputation::Reference { expected, .. } = self {
            for name in expected.iter() {
                if !record.contains(name) {
                    if let Some(m) = medians.get(name) {
                        record.insert(name.as_str(), m);
                    }
                }
            }
        }
    }
}

/// Stateless transformation from raw records to engineered features
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Names this engineer always emits when their inputs exist: the
    /// delivery-name dummies and the derived ratios
    pub fn produced_features(&self) -> Vec<String> {
        let mut names = dummy_columns();
        names.extend(
            [DEPTH_DURATION_RATIO, INSOL_PRAD_RATIO, STELLAR_LUMINOSITY_PROXY]
                .iter()
                .map(|s| s.to_string()),
        );
        names
    }

    /// Engineer one record
    pub fn engineer(&self, raw: &Record, imputation: &Imputation<'_>) -> EngineeredRecord {
        let mut record = self.stage(raw);
        imputation.fill(&mut record);
        self.finish(record)
    }

    /// Engineer a batch, imputing from medians taken over the batch itself
    pub fn engineer_batch(&self, raws: &[Record]) -> Vec<EngineeredRecord> {
        let staged: Vec<Record> = raws.iter().map(|r| self.stage(r)).collect();
        let medians = ColumnMedians::from_records(&staged);
        debug!(
            "Engineering batch of {} records with {} column medians",
            staged.len(),
            medians.len()
        );

        let imputation = Imputation::Batch(&medians);
        staged
            .into_iter()
            .map(|mut record| {
                imputation.fill(&mut record);
                self.finish(record)
            })
            .collect()
    }

    /// Prune excluded columns and expand the categorical column
    fn stage(&self, raw: &Record) -> Record {
        let mut record: Record = raw
            .iter()
            .filter(|(name, _)| !is_excluded(name))
            .map(|(name, value)| (name, value.clone()))
            .collect();
        expand_delivname(&mut record);
        record
    }

    /// Add derived ratios and keep only numeric cells
    fn finish(&self, mut record: Record) -> EngineeredRecord {
        derive(&mut record);

        let mut values = Vec::with_capacity(record.len());
        for (name, value) in record.iter() {
            match value {
                Value::Number(v) => values.push((name.to_string(), *v)),
                Value::Text(s) => debug!("Ignoring non-numeric column {}={}", name, s),
                Value::Missing => {}
            }
        }
        EngineeredRecord { values }
    }
}

fn derive(record: &mut Record) {
    if let (Some(depth), Some(duration)) = (record.number(KOI_DEPTH), record.number(KOI_DURATION)) {
        record.insert(DEPTH_DURATION_RATIO, depth / (duration + RATIO_EPSILON));
    }
    if let (Some(insol), Some(prad)) = (record.number(KOI_INSOL), record.number(KOI_PRAD)) {
        record.insert(INSOL_PRAD_RATIO, insol / (prad + RATIO_EPSILON));
    }
    if let (Some(steff), Some(srad)) = (record.number(KOI_STEFF), record.number(KOI_SRAD)) {
        record.insert(STELLAR_LUMINOSITY_PROXY, steff * srad.powi(2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(cells: &[(&str, Value)]) -> Record {
        cells.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_drops_identifier_columns() {
        let record = raw(&[
            ("kepid", Value::Number(10797460.0)),
            ("kepoi_name", Value::from("K00752.01")),
            ("koi_score", Value::Number(1.0)),
            ("koi_disposition", Value::from("CONFIRMED")),
            ("koi_period", Value::Number(9.48)),
        ]);

        let engineered = FeatureEngineer::new().engineer(&record, &Imputation::None);
        assert_eq!(
            engineered.names().collect::<Vec<_>>(),
            vec!["koi_period", "koi_tce_delivname_q1_q16_tce", "koi_tce_delivname_q1_q17_dr24_tce"]
        );
    }

    #[test]
    fn test_zero_duration_ratio() {
        let record = raw(&[
            ("koi_depth", Value::Number(500.0)),
            ("koi_duration", Value::Number(0.0)),
        ]);
        let engineered = FeatureEngineer::new().engineer(&record, &Imputation::None);

        assert_eq!(engineered.get(DEPTH_DURATION_RATIO), Some(500.0 / 1e-6));
    }

    #[test]
    fn test_derived_features() {
        let record = raw(&[
            ("koi_insol", Value::Number(93.59)),
            ("koi_prad", Value::Number(2.26)),
            ("koi_steff", Value::Number(5455.0)),
            ("koi_srad", Value::Number(0.927)),
        ]);
        let engineered = FeatureEngineer::new().engineer(&record, &Imputation::None);

        let ratio = engineered.get(INSOL_PRAD_RATIO).unwrap();
        assert!((ratio - 93.59 / (2.26 + 1e-6)).abs() < 1e-9);
        let lum = engineered.get(STELLAR_LUMINOSITY_PROXY).unwrap();
        assert!((lum - 5455.0 * 0.927 * 0.927).abs() < 1e-9);
        assert!(!engineered.contains(DEPTH_DURATION_RATIO));
    }

    #[test]
    fn test_missing_prerequisite_omits_feature() {
        let record = raw(&[("koi_depth", Value::Number(500.0)), ("koi_duration", Value::Missing)]);
        let engineered = FeatureEngineer::new().engineer(&record, &Imputation::None);

        assert!(!engineered.contains(DEPTH_DURATION_RATIO));
        assert!(!engineered.contains("koi_duration"));
    }

    #[test]
    fn test_reference_imputation_fills_expected_columns() {
        let medians: ColumnMedians = vec![
            ("koi_duration".to_string(), 4.0),
            ("koi_srad".to_string(), 1.0),
            ("koi_kepmag".to_string(), 14.5),
        ]
        .into_iter()
        .collect();
        let expected = vec![
            "koi_srad".to_string(),
            "koi_kepmag".to_string(),
            "koi_impact".to_string(),
        ];

        let record = raw(&[
            ("koi_depth", Value::Number(400.0)),
            ("koi_duration", Value::Missing),
            ("koi_steff", Value::Number(5800.0)),
        ]);
        let engineered = FeatureEngineer::new().engineer(
            &record,
            &Imputation::Reference {
                medians: &medians,
                expected: &expected,
            },
        );

        assert_eq!(engineered.get("koi_duration"), Some(4.0));
        assert_eq!(engineered.get("koi_kepmag"), Some(14.5));
        assert!(!engineered.contains("koi_impact"));
        assert_eq!(engineered.get(DEPTH_DURATION_RATIO), Some(400.0 / (4.0 + 1e-6)));
        assert_eq!(engineered.get(STELLAR_LUMINOSITY_PROXY), Some(5800.0));
    }

    #[test]
    fn test_batch_imputation_uses_batch_medians() {
        let rows = vec![
            raw(&[("koi_period", Value::Number(1.0))]),
            raw(&[("koi_period", Value::Number(5.0))]),
            raw(&[("koi_period", Value::Missing)]),
            raw(&[("koi_period", Value::Number(3.0))]),
        ];
        let engineered = FeatureEngineer::new().engineer_batch(&rows);

        assert_eq!(engineered[2].get("koi_period"), Some(3.0));
    }

    #[test]
    fn test_batch_dummies_fixed_regardless_of_composition() {
        let rows = vec![
            raw(&[("koi_tce_delivname", Value::from("q1_q16_tce"))]),
            raw(&[("koi_tce_delivname", Value::from("q1_q16_tce"))]),
        ];
        let engineered = FeatureEngineer::new().engineer_batch(&rows);

        for record in &engineered {
            assert_eq!(record.get("koi_tce_delivname_q1_q16_tce"), Some(1.0));
            assert_eq!(record.get("koi_tce_delivname_q1_q17_dr24_tce"), Some(0.0));
        }
    }

    proptest! {
        #[test]
        fn prop_engineering_is_idempotent(
            depth in 0.0f64..1e5,
            duration in 0.0f64..24.0,
            steff in 2000.0f64..12000.0,
            srad in proptest::option::of(0.1f64..50.0),
        ) {
            let mut record = raw(&[
                ("koi_depth", Value::Number(depth)),
                ("koi_duration", Value::Number(duration)),
                ("koi_steff", Value::Number(steff)),
                ("koi_tce_delivname", Value::from("q1_q17_dr24_tce")),
            ]);
            if let Some(srad) = srad {
                record.insert("koi_srad", srad);
            }

            let engineer = FeatureEngineer::new();
            let first = engineer.engineer(&record, &Imputation::None);
            let second = engineer.engineer(&record, &Imputation::None);
            prop_assert!(first.bit_eq(&second));
        }
    }
}
