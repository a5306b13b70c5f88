//! Stub models and gateway builders for unit tests

use crate::gateway::{ErrorPolicy, Gateway};
use inference_engine::{FeatureRow, FeatureSchema, InferenceEngine, InferenceError, Model};

/// Returns the arithmetic mean of the row
pub struct MeanModel;

impl Model for MeanModel {
    fn predict(&self, row: &FeatureRow<'_>) -> Result<f64, InferenceError> {
        Ok(row.values().iter().sum::<f64>() / row.len() as f64)
    }

    fn describe(&self) -> String {
        "mean".to_string()
    }
}

/// Fails every call the way a numeric library would
pub struct FailingModel;

impl Model for FailingModel {
    fn predict(&self, _row: &FeatureRow<'_>) -> Result<f64, InferenceError> {
        Err(InferenceError::InferenceFailed("matrix is singular".to_string()))
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

/// Gateway over columns a, b, c
pub fn gateway(model: impl Model + 'static, policy: ErrorPolicy) -> Gateway {
    let schema = FeatureSchema::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
    Gateway::new(InferenceEngine::new(schema, Box::new(model)).unwrap(), policy)
}

/// Gateway over `n` generated columns
pub fn gateway_with_columns(n: usize, model: impl Model + 'static, policy: ErrorPolicy) -> Gateway {
    let columns = (0..n).map(|i| format!("feature_{}", i)).collect();
    let schema = FeatureSchema::new(columns).unwrap();
    Gateway::new(InferenceEngine::new(schema, Box::new(model)).unwrap(), policy)
}
