//! Task result handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use tracing::warn;

use crate::http::error::ApiError;
use crate::http::responses::TaskResultResponse;
use crate::state::AppState;

/// POST /v1/tasks/{task_id}/result - Report a worker's result.
pub async fn submit_task_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TaskResultResponse>, ApiError> {
    let Json(payload) = body.map_err(|rejection| {
        warn!(task_id = %task_id, error = %rejection, "Invalid JSON in task result");
        state.orchestrator.metrics().record_result_rejected();
        ApiError::InvalidJson {
            message: rejection.body_text(),
        }
    })?;

    let receipt = state
        .orchestrator
        .submit_task_result(&task_id, payload, state.clock.now())
        .await?;
    Ok(Json(receipt.into()))
}
