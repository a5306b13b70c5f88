//! Flowguard Inference Gateway
//!
//! HTTP surface for the network-flow DDoS classifier: prediction, health and
//! Prometheus metrics. The model and schema are loaded before the listener is
//! bound, so nothing is served until the gateway is ready.

use axum::{
    routing::{get, post},
    Router,
};
use inference_engine::InferenceEngine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod routes;

#[cfg(test)]
mod testing;

pub use config::{GatewayConfig, LogFormat};
pub use error::{ErrorBody, StartupError};
pub use gateway::{ErrorPolicy, Gateway, PredictionError};
pub use metrics::{GatewayMetrics, MetricsSnapshot};

/// Create the application router
pub fn create_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/predict", post(routes::predict::predict))
        .route("/metrics", get(routes::metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Initialize logging
pub fn init_logging(config: &GatewayConfig) {
    // load_from has already rejected unknown levels
    let level = config.max_level().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = match config.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    };

    if installed.is_err() {
        warn!("Tracing subscriber already installed, keeping the existing one");
    }
}

/// A loaded gateway bound to its listener, not yet serving
pub struct Server {
    listener: TcpListener,
    gateway: Arc<Gateway>,
}

impl Server {
    /// Load artifacts, then bind. Load failures surface before any socket exists.
    pub async fn bind(config: &GatewayConfig) -> Result<Self, StartupError> {
        let engine = InferenceEngine::load(
            &config.model_path,
            &config.schema_path,
            &config.load_options(),
        )?;
        let gateway = Arc::new(Gateway::new(engine, config.error_policy()));
        info!("Validation errors counted as failures: {:?}", gateway.policy());

        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;

        Ok(Self { listener, gateway })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn gateway(&self) -> Arc<Gateway> {
        Arc::clone(&self.gateway)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Starting API server on {}", addr);
        }

        let app = create_router(self.gateway);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(StartupError::Serve)?;

        info!("API server stopped");
        Ok(())
    }
}

/// Run the server until Ctrl-C or SIGTERM
pub async fn run_server(config: GatewayConfig) -> Result<(), StartupError> {
    Server::bind(&config).await?.serve(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use crate::routes::health::HealthResponse;
    use crate::routes::predict::PredictResponse;
    use crate::testing::{gateway, FailingModel, MeanModel};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn post_json(body: &str) -> Request<Body> {
        Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn read_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(Arc::new(gateway(MeanModel, ErrorPolicy::InferenceOnly)));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = read_json(response).await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_predict_ok() {
        let gw = Arc::new(gateway(MeanModel, ErrorPolicy::InferenceOnly));
        let app = create_router(gw.clone());

        let response = app
            .oneshot(post_json(r#"{"features": [1.0, 2.0, 3.0]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: PredictResponse = read_json(response).await;
        assert_eq!(body.prediction, 2.0);
        assert_eq!(gw.metrics().snapshot().requests_total, 1);
    }

    #[tokio::test]
    async fn test_predict_shape_mismatch_is_400() {
        let gw = Arc::new(gateway(MeanModel, ErrorPolicy::InferenceOnly));
        let app = create_router(gw.clone());

        let response = app
            .oneshot(post_json(r#"{"features": [1.0, 2.0]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error.kind, "shape_mismatch");
        assert_eq!(body.error.message, "Expected 3 features, got 2");
        assert_eq!(gw.metrics().snapshot().errors_total, 0);
    }

    #[tokio::test]
    async fn test_predict_string_value_is_400() {
        let app = create_router(Arc::new(gateway(MeanModel, ErrorPolicy::InferenceOnly)));

        let response = app
            .oneshot(post_json(r#"{"features": [1.0, "2.0", 3.0]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error.kind, "invalid_value");
        assert!(body.error.message.contains("(b)"), "{}", body.error.message);
    }

    #[tokio::test]
    async fn test_predict_malformed_body_is_400_and_counted() {
        let gw = Arc::new(gateway(MeanModel, ErrorPolicy::IncludeValidation));
        let app = create_router(gw.clone());

        let response = app.oneshot(post_json(r#"{"feats": [1, 2, 3]}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error.kind, "invalid_request");
        assert_eq!(
            gw.metrics().snapshot(),
            MetricsSnapshot {
                requests_total: 1,
                errors_total: 1
            }
        );
    }

    #[tokio::test]
    async fn test_predict_bare_nan_token_is_invalid_request() {
        // NaN/Infinity are not JSON; the body is refused before any value check.
        let gw = Arc::new(gateway(MeanModel, ErrorPolicy::InferenceOnly));
        let app = create_router(gw.clone());

        for body in [r#"{"features": [1.0, NaN, 3.0]}"#, r#"{"features": [1.0, Infinity, 3.0]}"#] {
            let response = app.clone().oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let error: ErrorBody = read_json(response).await;
            assert_eq!(error.error.kind, "invalid_request");
        }
        assert_eq!(gw.metrics().snapshot().requests_total, 2);
    }

    #[tokio::test]
    async fn test_predict_model_failure_is_sanitized_500() {
        let gw = Arc::new(gateway(FailingModel, ErrorPolicy::InferenceOnly));
        let app = create_router(gw.clone());

        let response = app
            .oneshot(post_json(r#"{"features": [1.0, 2.0, 3.0]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error.kind, "inference_error");
        assert!(!body.error.message.contains("singular"));
        assert_eq!(gw.metrics().snapshot().errors_total, 1);
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let gw = Arc::new(gateway(FailingModel, ErrorPolicy::InferenceOnly));
        let app = create_router(gw.clone());

        app.clone()
            .oneshot(post_json(r#"{"features": [1.0, 2.0, 3.0]}"#))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            routes::metrics::EXPOSITION_CONTENT_TYPE
        );
        let text = read_text(response).await;
        assert!(text.contains("predict_requests_total 1"), "{}", text);
        assert!(text.contains("predict_errors_total 1"), "{}", text);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_router(Arc::new(gateway(MeanModel, ErrorPolicy::InferenceOnly)));
        let response = app
            .oneshot(Request::get("/v1/predict").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
