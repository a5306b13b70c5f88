//! ONNX backend using tract

use crate::model::Model;
use crate::schema::FeatureRow;
use crate::{InferenceError, LoadError};
use std::io::Cursor;
use tract_onnx::prelude::*;
use tracing::{debug, info};

/// Optimized ONNX plan pinned to a single `f32 [1, F]` input row
pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    num_features: usize,
    output_index: usize,
}

impl OnnxModel {
    /// Parse and optimize an ONNX graph.
    ///
    /// `output_index` selects which graph output carries the score. Converted
    /// tree classifiers usually emit the label first and probabilities second.
    pub fn from_bytes(
        bytes: &[u8],
        num_features: usize,
        output_index: usize,
    ) -> Result<Self, LoadError> {
        let plan = tract_onnx::onnx()
            .model_for_read(&mut Cursor::new(bytes))
            .and_then(|model| model.with_input_fact(0, f32::fact([1, num_features]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| LoadError::ModelLoadError(format!("invalid ONNX graph: {}", e)))?;

        let outputs = plan.model().outputs.len();
        if output_index >= outputs {
            return Err(LoadError::ModelLoadError(format!(
                "output index {} out of range, graph has {} outputs",
                output_index, outputs
            )));
        }

        info!(
            "ONNX model ready: {} features, reading output {} of {}",
            num_features, output_index, outputs
        );

        Ok(Self {
            plan,
            num_features,
            output_index,
        })
    }
}

impl Model for OnnxModel {
    fn predict(&self, row: &FeatureRow<'_>) -> Result<f64, InferenceError> {
        if row.len() != self.num_features {
            return Err(InferenceError::InvalidInputShape {
                expected: self.num_features,
                actual: row.len(),
            });
        }

        let data: Vec<f32> = row.values().iter().map(|&v| v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.num_features), data)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let output = outputs.get(self.output_index).ok_or_else(|| {
            InferenceError::InferenceFailed(format!("missing output {}", self.output_index))
        })?;
        let scores = output
            .cast_to::<f64>()
            .map_err(|e| InferenceError::InferenceFailed(format!("non-numeric output: {}", e)))?;
        let score = scores
            .as_slice::<f64>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
            .first()
            .copied()
            .ok_or_else(|| InferenceError::InferenceFailed("model returned an empty output".to_string()))?;

        debug!("ONNX score: {}", score);
        Ok(score)
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.num_features)
    }

    fn describe(&self) -> String {
        format!("onnx (output {})", self.output_index)
    }
}
