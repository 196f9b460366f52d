//! Usage statistics handler.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::http::responses::StatsResponse;
use crate::state::AppState;

/// GET /v1/stats - Quota usage in the current periods.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let now = state.clock.now();
    Json(StatsResponse {
        usage: state.orchestrator.usage(now),
        timestamp: now.to_rfc3339(),
    })
}
