//! Web server module for the sslwatch exporter.
//!
//! Serves the Prometheus text exposition on `/metrics` plus a liveness
//! probe and a small landing page.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registry holding the exporter; gathered on every `/metrics` hit.
    pub registry: Registry,
    /// Number of configured targets, reported on `/healthz`.
    pub targets: usize,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    targets: usize,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Landing page handler.
async fn index_handler() -> Html<&'static str> {
    Html(
        "<html><head><title>sslwatch</title></head>\
         <body><h1>sslwatch</h1><p><a href=\"/metrics\">Metrics</a></p></body></html>",
    )
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        targets: state.targets,
    })
}

/// Scrape endpoint. Gathering drives the probes, which perform blocking
/// network I/O, so it runs on the blocking pool rather than a runtime
/// worker.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let registry = state.registry.clone();
    let families = match tokio::task::spawn_blocking(move || registry.gather()).await {
        Ok(families) => families,
        Err(err) => {
            tracing::error!(error = %err, "scrape task panicked");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
