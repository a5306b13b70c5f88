//! Feature Vector Validator

use crate::error::{ValidationError, ValueFault};
use serde_json::Value;
use tracing::debug;

/// Validator bound to an ordered column layout
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    columns: &'a [String],
}

impl<'a> Validator<'a> {
    /// Create a validator for the given columns
    pub fn new(columns: &'a [String]) -> Self {
        Self { columns }
    }

    /// Number of features every request must carry
    pub fn expected_len(&self) -> usize {
        self.columns.len()
    }

    /// Check the vector length against the column count
    pub fn validate_shape(&self, actual: usize) -> Result<(), ValidationError> {
        let expected = self.expected_len();
        if actual != expected {
            debug!("Shape mismatch: expected {}, got {}", expected, actual);
            return Err(ValidationError::ShapeMismatch { expected, actual });
        }
        Ok(())
    }

    /// Validate a numeric feature vector: shape first, then finiteness
    pub fn validate(&self, values: &[f64]) -> Result<(), ValidationError> {
        self.validate_shape(values.len())?;

        match values.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(self.invalid(index, ValueFault::NotFinite)),
            None => Ok(()),
        }
    }

    /// Convert raw JSON values into a validated numeric vector.
    ///
    /// Only JSON numbers are accepted. Numeric strings, booleans and nulls are
    /// refused rather than coerced.
    pub fn coerce(&self, raw: &[Value]) -> Result<Vec<f64>, ValidationError> {
        self.validate_shape(raw.len())?;

        let mut values = Vec::with_capacity(raw.len());
        for (index, value) in raw.iter().enumerate() {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                other => return Err(self.invalid(index, ValueFault::NotNumeric(json_kind(other)))),
            };
            match number {
                Some(v) if v.is_finite() => values.push(v),
                _ => return Err(self.invalid(index, ValueFault::NotFinite)),
            }
        }

        Ok(values)
    }

    fn invalid(&self, index: usize, fault: ValueFault) -> ValidationError {
        ValidationError::InvalidValue {
            index,
            column: self.columns.get(index).cloned().unwrap_or_default(),
            fault,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
