//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::error;

use crate::error::OrchestratorError;
use crate::http::responses::ErrorResponse;

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Request body could not be parsed.
    InvalidJson { message: String },
    /// Error from the orchestrator.
    Orchestrator(OrchestratorError),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self::Orchestrator(err)
    }
}

impl ApiError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        let err = match self {
            Self::InvalidJson { .. } => return StatusCode::BAD_REQUEST,
            Self::Orchestrator(err) => err,
        };

        match err {
            OrchestratorError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            OrchestratorError::InvalidBriefing(_)
            | OrchestratorError::MalformedTaskId(_)
            | OrchestratorError::InvalidResult(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::RunNotFound(_) | OrchestratorError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::InvalidJson { message } => message,
            Self::Orchestrator(err) => err.to_string(),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = ErrorResponse {
            error: message,
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
