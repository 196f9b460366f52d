//! HTTP server for the control plane.
//!
//! Provides endpoints for:
//! - Briefing submission (`/v1/briefings`)
//! - Run status and results (`/v1/runs/{run_id}`, `/v1/runs/{run_id}/results`)
//! - Worker result reporting (`/v1/tasks/{task_id}/result`)
//! - Quota usage (`/v1/stats`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod error;
mod handlers;
pub mod responses;

pub use error::ApiError;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // API routes
        .route("/v1/briefings", post(handlers::submit_briefing))
        .route("/v1/runs/:run_id", get(handlers::get_run))
        .route("/v1/runs/:run_id/results", get(handlers::get_run_results))
        .route("/v1/tasks/:task_id/result", post(handlers::submit_task_result))
        .route("/v1/stats", get(handlers::get_stats))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
