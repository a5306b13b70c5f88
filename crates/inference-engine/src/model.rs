//! Model Capability

use crate::schema::FeatureRow;
use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A loaded, immutable classifier.
///
/// Implementations are shared read-only across all request handlers.
pub trait Model: Send + Sync {
    /// Score one labeled row
    fn predict(&self, row: &FeatureRow<'_>) -> Result<f64, InferenceError>;

    /// Feature count the artifact was trained with, when it records one
    fn num_features(&self) -> Option<usize> {
        None
    }

    /// Training column names, when the artifact embeds them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Short human-readable description for startup logs
    fn describe(&self) -> String;
}

/// Supported artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFormat {
    /// ONNX graph, run with tract
    Onnx,
    /// XGBoost native JSON (`Booster.save_model("model.json")`)
    XgboostJson,
}

impl ModelFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "onnx" => Some(ModelFormat::Onnx),
            "json" => Some(ModelFormat::XgboostJson),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Onnx => "onnx",
            ModelFormat::XgboostJson => "xgboost-json",
        }
    }
}
