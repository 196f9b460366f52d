//! Health and metrics handlers.

use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::state::AppState;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": state.clock.now().to_rfc3339(),
    }))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(&state);
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
