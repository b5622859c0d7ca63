//! Categorical Expansion

use koi_record::columns::{delivname_dummy, DELIVNAME_CATEGORIES, DELIVNAME_COLUMN};
use koi_record::{Record, Value};
use tracing::debug;

/// Replace the delivery-name column with its fixed set of dummy columns.
///
/// The dummies are emitted for every record. Categories outside
/// `DELIVNAME_CATEGORIES`, missing cells and records without the column all
/// set every dummy to zero. Returns whether the record carried the column.
pub fn expand_delivname(record: &mut Record) -> bool {
    let value = record.remove(DELIVNAME_COLUMN);
    let present = value.is_some();

    let category = match &value {
        Some(Value::Text(s)) => Some(s.as_str()),
        Some(Value::Missing) | None => None,
        Some(Value::Number(v)) => {
            debug!("Numeric delivery name {} treated as unknown category", v);
            None
        }
    };

    if let Some(c) = category {
        if !DELIVNAME_CATEGORIES.contains(&c) {
            debug!("Dropping unrecognised delivery category {}", c);
        }
    }

    for known in DELIVNAME_CATEGORIES {
        let hit = category == Some(known);
        record.insert(delivname_dummy(known), if hit { 1.0 } else { 0.0 });
    }
    present
}

/// Dummy column names in their fixed order
pub fn dummy_columns() -> Vec<String> {
    DELIVNAME_CATEGORIES.iter().map(|c| delivname_dummy(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_category() {
        let mut record = Record::new();
        record.insert("koi_depth", 10.0);
        record.insert(DELIVNAME_COLUMN, "q1_q17_dr24_tce");

        assert!(expand_delivname(&mut record));
        assert!(!record.contains(DELIVNAME_COLUMN));
        assert_eq!(record.number("koi_tce_delivname_q1_q16_tce"), Some(0.0));
        assert_eq!(record.number("koi_tce_delivname_q1_q17_dr24_tce"), Some(1.0));
    }

    #[test]
    fn test_unknown_category_pads_zeros() {
        let mut record = Record::new();
        record.insert(DELIVNAME_COLUMN, "q1_q17_dr25_tce");

        expand_delivname(&mut record);
        assert_eq!(record.len(), 2);
        assert!(record.iter().all(|(_, v)| *v == Value::Number(0.0)));
    }

    #[test]
    fn test_absent_column_padded() {
        let mut record = Record::new();
        record.insert("koi_depth", 10.0);
        assert!(!expand_delivname(&mut record));
        assert_eq!(record.len(), 3);
        assert_eq!(record.number("koi_tce_delivname_q1_q16_tce"), Some(0.0));
        assert_eq!(record.number("koi_tce_delivname_q1_q17_dr24_tce"), Some(0.0));
    }

    #[test]
    fn test_dummy_column_order() {
        assert_eq!(
            dummy_columns(),
            vec!["koi_tce_delivname_q1_q16_tce", "koi_tce_delivname_q1_q17_dr24_tce"]
        );
    }
}
