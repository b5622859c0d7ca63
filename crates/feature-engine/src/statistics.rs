//! Column Statistics

use koi_record::{Record, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Summary statistics for one numeric column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStatistics {
    /// Mean value
    pub mean: f64,
    /// Population standard deviation (ddof = 0)
    pub std_dev: f64,
    /// Median (mean of the middle pair for even counts)
    pub median: f64,
}

impl ColumnStatistics {
    /// Compute statistics from a slice of values; `None` when empty
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        let m2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        let std_dev = (m2 / n).sqrt();

        Some(Self {
            mean,
            std_dev,
            median: median(values)?,
        })
    }
}

/// Median of a slice; `None` when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Per-column medians over a set of records, numeric columns only.
///
/// A column qualifies when it holds at least one number and no text; missing
/// cells are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMedians {
    medians: BTreeMap<String, f64>,
}

impl ColumnMedians {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut textual: HashSet<String> = HashSet::new();

        for record in records {
            for (name, value) in record.iter() {
                match value {
                    Value::Number(v) => columns.entry(name.to_string()).or_default().push(*v),
                    Value::Text(_) => {
                        textual.insert(name.to_string());
                    }
                    Value::Missing => {}
                }
            }
        }

        let medians = columns
            .into_iter()
            .filter(|(name, _)| !textual.contains(name))
            .filter_map(|(name, values)| median(&values).map(|m| (name, m)))
            .collect();

        Self { medians }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.medians.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.medians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medians.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.medians.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for ColumnMedians {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            medians: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_computation() {
        let stats = ColumnStatistics::compute(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((stats.mean - 3.0).abs() < 0.001);
        assert_eq!(stats.median, 3.0);
    }

    #[test]
    fn test_std_dev_computation() {
        let stats = ColumnStatistics::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.median, 4.5);
    }

    #[test]
    fn test_empty_values() {
        assert!(ColumnStatistics::compute(&[]).is_none());
        assert!(median(&[]).is_none());
    }

    #[test]
    fn test_column_medians_skip_text_columns() {
        let rows: Vec<Record> = vec![
            [("a", Value::Number(1.0)), ("b", Value::from("x")), ("c", Value::Missing)]
                .into_iter()
                .collect(),
            [("a", Value::Number(3.0)), ("b", Value::Number(2.0)), ("c", Value::Missing)]
                .into_iter()
                .collect(),
            [("a", Value::Missing)].into_iter().collect(),
        ];

        let medians = ColumnMedians::from_records(&rows);
        assert_eq!(medians.get("a"), Some(2.0));
        assert_eq!(medians.get("b"), None);
        assert_eq!(medians.get("c"), None);
        assert_eq!(medians.len(), 1);
    }
}
