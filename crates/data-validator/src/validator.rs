//! Data Validator for Type Checking

use crate::error::ValidationError;
use koi_record::{Record, Value};
use std::collections::HashSet;
use tracing::debug;

/// Checks that the numeric fields of a record hold numbers
#[derive(Debug, Clone)]
pub struct Validator {
    numeric_columns: HashSet<String>,
}

impl Validator {
    /// Create a validator for the given numeric columns
    pub fn new<I, S>(numeric_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numeric_columns: numeric_columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_columns.contains(column)
    }

    /// Validate a single value
    pub fn validate_value(&self, column: &str, value: &Value) -> Result<(), ValidationError> {
        match value {
            Value::Text(text) if self.is_numeric(column) => Err(ValidationError::MalformedInput {
                column: column.to_string(),
                value: text.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Validate every cell, collecting all violations
    pub fn validate(&self, record: &Record) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = record
            .iter()
            .filter_map(|(column, value)| self.validate_value(column, value).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            debug!("Record failed validation with {} errors", errors.len());
            Err(errors)
        }
    }

    /// Validate cells and require the named fields to carry a number
    pub fn validate_required(
        &self,
        record: &Record,
        required: &[&str],
    ) -> Result<(), Vec<ValidationError>> {
        let mut errors = match self.validate(record) {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        for field in required {
            match record.get(field) {
                Some(Value::Number(_)) => {}
                // already reported above when the field is numeric
                Some(Value::Text(_)) if self.is_numeric(field) => {}
                Some(Value::Text(text)) => errors.push(ValidationError::MalformedInput {
                    column: field.to_string(),
                    value: text.clone(),
                }),
                Some(Value::Missing) | None => errors.push(ValidationError::MissingField {
                    column: field.to_string(),
                }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
