//! Inference Engine Implementation

use crate::model::{Model, ModelFormat};
use crate::onnx::OnnxModel;
use crate::schema::FeatureSchema;
use crate::xgboost::XgboostModel;
use crate::{read_artifact, InferenceError, LoadError};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, warn};

/// Knobs for artifact loading
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit format; inferred from the model file extension when unset
    pub format: Option<ModelFormat>,
    /// ONNX graph output holding the score
    pub onnx_output_index: usize,
}

/// The loaded `(schema, model)` pair
pub struct InferenceEngine {
    schema: FeatureSchema,
    model: Box<dyn Model>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("features", &self.schema.len())
            .field("model", &self.model.describe())
            .finish()
    }
}

impl InferenceEngine {
    /// Pair an already-built model with its schema.
    ///
    /// Fails when the model records a feature count or feature names that
    /// disagree with the schema.
    pub fn new(schema: FeatureSchema, model: Box<dyn Model>) -> Result<Self, LoadError> {
        if let Some(count) = model.num_features() {
            if count != schema.len() {
                return Err(LoadError::ArtifactMismatch(format!(
                    "model expects {} features, schema lists {}",
                    count,
                    schema.len()
                )));
            }
        }

        if let Some(names) = model.feature_names() {
            if names != schema.columns() {
                let position = names
                    .iter()
                    .zip(schema.columns())
                    .position(|(trained, listed)| trained != listed)
                    .unwrap_or_else(|| names.len().min(schema.len()));
                return Err(LoadError::ArtifactMismatch(format!(
                    "model was trained on a different column order (first difference at position {})",
                    position
                )));
            }
            debug!("Model feature names match schema");
        }

        Ok(Self { schema, model })
    }

    /// Load schema and model from disk and verify they belong together
    pub fn load(
        model_path: &Path,
        schema_path: &Path,
        options: &LoadOptions,
    ) -> Result<Self, LoadError> {
        info!(
            "Loading model artifact {} with schema {}",
            model_path.display(),
            schema_path.display()
        );

        let schema = FeatureSchema::from_path(schema_path)?;
        let bytes = read_artifact("model artifact", model_path)?;

        match schema.model_sha256() {
            Some(expected) => {
                let actual = sha256_hex(&bytes);
                if !actual.eq_ignore_ascii_case(expected.trim()) {
                    return Err(LoadError::ArtifactMismatch(format!(
                        "model sha256 is {}, schema expects {}",
                        actual, expected
                    )));
                }
                info!("Model digest verified: {}", actual);
            }
            None => warn!("Schema does not pin a model digest; pairing is not verified"),
        }

        let format = options
            .format
            .or_else(|| ModelFormat::from_path(model_path))
            .ok_or_else(|| {
                LoadError::UnsupportedFormat(format!(
                    "cannot infer format of {}; set model_format explicitly",
                    model_path.display()
                ))
            })?;

        let model: Box<dyn Model> = match format {
            ModelFormat::XgboostJson => Box::new(XgboostModel::from_slice(&bytes)?),
            ModelFormat::Onnx => Box::new(OnnxModel::from_bytes(
                &bytes,
                schema.len(),
                options.onnx_output_index,
            )?),
        };

        let engine = Self::new(schema, model)?;
        info!(
            "Inference engine ready: {} features, model {}",
            engine.schema.len(),
            engine.model.describe()
        );
        Ok(engine)
    }

    /// Schema used for every request
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Model description for logs
    pub fn describe_model(&self) -> String {
        self.model.describe()
    }

    /// Score one feature vector laid out in schema order
    pub fn predict(&self, values: &[f64]) -> Result<f64, InferenceError> {
        let row = self.schema.label(values)?;
        let score = self.model.predict(&row)?;
        if !score.is_finite() {
            return Err(InferenceError::NonFiniteScore(score));
        }
        Ok(score)
    }
}

/// Lowercase hex SHA-256 of a byte slice
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
