//! Briefing submission handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{info, warn};

use briefrun_core::Briefing;

use crate::http::error::ApiError;
use crate::http::responses::SubmitBriefingRequest;
use crate::orchestrator::BriefingReceipt;
use crate::state::AppState;

/// Header naming the submitting user. Trusted as-is.
pub const USER_HEADER: &str = "x-bz-user";

fn submitter(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
}

/// POST /v1/briefings - Admit a briefing and dispatch its tasks.
pub async fn submit_briefing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<SubmitBriefingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BriefingReceipt>), ApiError> {
    let Json(req) = body.map_err(|rejection| {
        warn!(error = %rejection, "Invalid JSON in briefing request");
        ApiError::InvalidJson {
            message: rejection.body_text(),
        }
    })?;

    let mut briefing = Briefing::new(req.briefing).with_priority(req.priority);
    if let Some(user) = submitter(&headers) {
        briefing = briefing.with_submitter(user);
    }

    info!(
        submitted_by = %briefing.submitted_by,
        priority = %briefing.priority.as_str(),
        "Received briefing"
    );

    let receipt = state
        .orchestrator
        .submit_briefing(briefing, state.clock.now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}
