//! # HTTP Server
//!
//! HTTP server for metrics, health checks, and Kubernetes probes.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once the agent has started its loops)
//!
//! The server runs on port 5000 by default (configurable via `METRICS_PORT`).

use crate::observability::metrics::REGISTRY;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Debug, Default)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

pub async fn start_server<F>(port: u16, state: Arc<ServerState>, shutdown: F) -> Result<(), anyhow::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {e}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status(state: Arc<ServerState>, path: &str) -> StatusCode {
        router(state)
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_readyz_follows_state() {
        let state = Arc::new(ServerState::default());
        assert_eq!(status(Arc::clone(&state), "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);

        state.is_ready.store(true, Ordering::Relaxed);
        assert_eq!(status(state, "/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthz_and_metrics() {
        let state = Arc::new(ServerState::default());
        assert_eq!(status(Arc::clone(&state), "/healthz").await, StatusCode::OK);
        assert_eq!(status(state, "/metrics").await, StatusCode::OK);
    }
}
