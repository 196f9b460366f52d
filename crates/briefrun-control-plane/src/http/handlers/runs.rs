//! Run query handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use briefrun_core::{RunId, RunView};

use crate::http::error::ApiError;
use crate::orchestrator::RunResults;
use crate::state::AppState;

/// GET /v1/runs/{run_id} - Current run status.
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    let view = state.orchestrator.get_run_status(&RunId::new(run_id)).await?;
    Ok(Json(view))
}

/// GET /v1/runs/{run_id}/results - Raw results reported for a run.
pub async fn get_run_results(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResults>, ApiError> {
    let results = state.orchestrator.get_run_results(&RunId::new(run_id)).await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handlers::test_support::{state, t0};
    use axum::http::StatusCode;
    use briefrun_core::{Briefing, RunStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_run_and_results() {
        let state = state();
        let receipt = state
            .orchestrator
            .submit_briefing(Briefing::new("write code"), t0())
            .await
            .unwrap();
        state
            .orchestrator
            .submit_task_result(&receipt.run_id.task(0).to_string(), json!({"diff": "+1"}), t0())
            .await
            .unwrap();

        let Json(view) = get_run(State(state.clone()), Path(receipt.run_id.to_string()))
            .await
            .unwrap();
        assert_eq!(view.status, RunStatus::Completed);

        let Json(results) = get_run_results(State(state), Path(receipt.run_id.to_string()))
            .await
            .unwrap();
        assert_eq!(results.tasks_completed, 1);
        assert_eq!(results.results[&receipt.run_id.task(0).to_string()]["diff"], "+1");
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let err = get_run(State(state()), Path("nope".to_string())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
