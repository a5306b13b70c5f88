//! Prediction Route

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::gateway::{Gateway, PredictionError};

/// Request body. Values stay untyped so non-numbers can be reported per position.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

/// Score one flow
pub async fn predict(
    State(gateway): State<Arc<Gateway>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, PredictionError> {
    let Json(request) = payload.map_err(|rejection| gateway.reject_request(rejection.body_text()))?;
    let prediction = gateway.predict_json(&request.features)?;
    Ok(Json(PredictResponse { prediction }))
}
