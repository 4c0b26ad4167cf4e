//! # Health and Metrics Server
//!
//! `axum` router exposing liveness, readiness, and Prometheus scrape
//! endpoints. Readiness is gated on `ServerState.is_ready`, which
//! `start_server` flips once the listener is bound, so kubelet's readiness
//! probe only starts passing after the port actually accepts connections.

use crate::observability::metrics;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared readiness flag, flipped once the controller has completed its
/// startup reconciliation pass.
#[derive(Clone)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            is_ready: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz(State(state): State<ServerState>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("failed to render metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the health/metrics router on `port`. Marks `state` ready
/// once the listener is bound, so readiness probes pass as soon as the port
/// accepts connections.
pub async fn start_server(port: u16, state: ServerState) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("health/metrics server listening on {addr}");
    state.is_ready.store(true, Ordering::Relaxed);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
