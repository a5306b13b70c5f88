//! Error responses and startup failures

use crate::gateway::PredictionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inference_engine::LoadError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned for model failures; details stay in the server log
const INFERENCE_FAILURE_MESSAGE: &str = "The model could not score this request";

/// Error payload: `{"error": {"kind": ..., "message": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl PredictionError {
    /// HTTP status for this failure
    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let message = match &self {
            PredictionError::Inference(_) => INFERENCE_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Anything that keeps the process from reaching the serving state
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
