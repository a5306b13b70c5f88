//! Validation Error Types

use std::fmt;
use thiserror::Error;

/// Why a single feature value was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFault {
    /// NaN or an infinity
    NotFinite,
    /// A JSON value that is not a number (string, bool, null, ...)
    NotNumeric(&'static str),
}

impl fmt::Display for ValueFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueFault::NotFinite => write!(f, "value is not finite"),
            ValueFault::NotNumeric(kind) => write!(f, "expected a number, got {}", kind),
        }
    }
}

/// Errors during feature validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Feature vector length differs from the schema length
    #[error("Expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A single element is unusable
    #[error("Feature {index} ({column}): {fault}")]
    InvalidValue {
        index: usize,
        column: String,
        fault: ValueFault,
    },
}

impl ValidationError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::ShapeMismatch { .. } => "shape_mismatch",
            ValidationError::InvalidValue { .. } => "invalid_value",
        }
    }
}
