//! Metrics Route

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::gateway::Gateway;

/// Prometheus text exposition content type
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub async fn metrics(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        gateway.metrics().render(),
    )
}
