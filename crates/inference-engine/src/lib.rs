//! Flow Classifier Inference Engine
//!
//! Loads the feature schema and the trained model artifact once, then scores
//! single labeled rows. Two artifact formats are supported: ONNX graphs run
//! through tract, and native XGBoost JSON tree dumps.

mod engine;
mod model;
mod onnx;
mod schema;
mod xgboost;

pub use engine::{InferenceEngine, LoadOptions};
pub use model::{Model, ModelFormat};
pub use onnx::OnnxModel;
pub use schema::{FeatureRow, FeatureSchema};
pub use xgboost::XgboostModel;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while scoring a row
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: usize, actual: usize },
    #[error("Model produced a non-finite score: {0}")]
    NonFiniteScore(f64),
}

/// Errors while loading the schema or the model artifact.
///
/// Every variant is fatal for the process: nothing is served without a
/// complete, consistent pair of artifacts.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },
    #[error("Failed to read {what} at {}: {source}", path.display())]
    Io {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),
    #[error("Model and schema do not belong together: {0}")]
    ArtifactMismatch(String),
}

/// Read a whole artifact, separating "missing" from other I/O failures
pub(crate) fn read_artifact(what: &'static str, path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::NotFound {
            what,
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            what,
            path: path.to_path_buf(),
            source,
        },
    })
}
