//! Prediction Gateway
//!
//! Owns the loaded engine and the counters, and runs every prediction
//! through validation, inference and accounting.

use crate::metrics::GatewayMetrics;
use data_validator::{ValidationError, Validator};
use inference_engine::{InferenceEngine, InferenceError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Which failures count toward `errors_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Only model failures
    #[default]
    InferenceOnly,
    /// Model failures and rejected input
    IncludeValidation,
}

impl ErrorPolicy {
    pub fn from_flag(count_validation_errors: bool) -> Self {
        if count_validation_errors {
            ErrorPolicy::IncludeValidation
        } else {
            ErrorPolicy::InferenceOnly
        }
    }

    fn counts_rejections(self) -> bool {
        self == ErrorPolicy::IncludeValidation
    }
}

/// Errors returned by a prediction
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Feature vector has the wrong length or an unusable value
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Body could not be decoded into a feature list
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The model could not score valid input
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictionError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Invalid(e) => e.kind(),
            PredictionError::InvalidRequest(_) => "invalid_request",
            PredictionError::Inference(_) => "inference_error",
        }
    }

    /// True when the caller must fix the request
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PredictionError::Inference(_))
    }
}

/// Inference gateway state shared by all handlers
pub struct Gateway {
    engine: InferenceEngine,
    metrics: GatewayMetrics,
    policy: ErrorPolicy,
}

impl Gateway {
    pub fn new(engine: InferenceEngine, policy: ErrorPolicy) -> Self {
        Self {
            engine,
            metrics: GatewayMetrics::new(),
            policy,
        }
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Score a numeric feature vector
    pub fn predict(&self, features: &[f64]) -> Result<f64, PredictionError> {
        self.metrics.record_request();

        let validator = Validator::new(self.engine.schema().columns());
        if let Err(e) = validator.validate(features) {
            return Err(self.rejected(e.into()));
        }
        self.score(features)
    }

    /// Score raw JSON values; anything other than a JSON number is refused
    pub fn predict_json(&self, features: &[Value]) -> Result<f64, PredictionError> {
        self.metrics.record_request();

        let validator = Validator::new(self.engine.schema().columns());
        let values = match validator.coerce(features) {
            Ok(values) => values,
            Err(e) => return Err(self.rejected(e.into())),
        };
        self.score(&values)
    }

    /// Account for a request whose body never yielded a feature list
    pub fn reject_request(&self, reason: impl Into<String>) -> PredictionError {
        self.metrics.record_request();
        self.rejected(PredictionError::InvalidRequest(reason.into()))
    }

    fn rejected(&self, err: PredictionError) -> PredictionError {
        debug!("Prediction rejected ({}): {}", err.kind(), err);
        if self.policy.counts_rejections() {
            self.metrics.record_error();
        }
        err
    }

    fn score(&self, values: &[f64]) -> Result<f64, PredictionError> {
        match self.engine.predict(values) {
            Ok(score) => {
                debug!("Prediction: {}", score);
                Ok(score)
            }
            Err(e) => {
                self.metrics.record_error();
                error!(
                    feature_count = values.len(),
                    model = %self.engine.describe_model(),
                    error = %e,
                    "Model inference failed"
                );
                Err(e.into())
            }
        }
    }
}
