//! Errors surfaced by the orchestrator to the boundary layer.

use briefrun_core::{CoreError, QuotaKind, RunId};
use thiserror::Error;

use crate::collector::CollectError;
use crate::rate_limiter::QuotaExceeded;
use crate::registry::RegistryError;

/// Orchestrator errors.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("{kind} limit exceeded ({limit})")]
    QuotaExceeded { kind: QuotaKind, limit: u64 },

    #[error("Invalid briefing: {0}")]
    InvalidBriefing(String),

    #[error("Malformed task id: {0}")]
    MalformedTaskId(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl OrchestratorError {
    /// Transient infrastructure faults a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<QuotaExceeded> for OrchestratorError {
    fn from(err: QuotaExceeded) -> Self {
        Self::QuotaExceeded {
            kind: err.kind,
            limit: err.limit,
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedTaskId(id) => Self::MalformedTaskId(id),
            CoreError::TaskNotFound(id) => Self::TaskNotFound(id),
            CoreError::InvalidResultStatus(_) => Self::InvalidResult(err.to_string()),
            CoreError::EmptyBriefing | CoreError::TooManyTasks { .. } | CoreError::InvalidPriority(_) => {
                Self::InvalidBriefing(err.to_string())
            }
            CoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}

impl From<RegistryError> for OrchestratorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(run_id) => Self::RunNotFound(run_id),
            RegistryError::Domain(core) => core.into(),
            RegistryError::StorageUnavailable(msg) => Self::StorageUnavailable(msg),
            RegistryError::Contended { .. } => Self::StorageUnavailable(err.to_string()),
            RegistryError::AlreadyExists(_) | RegistryError::Storage(_) => Self::Storage(err.to_string()),
        }
    }
}

impl From<CollectError> for OrchestratorError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::MalformedTaskId(id) => Self::MalformedTaskId(id),
            CollectError::RunNotFound(run_id) => Self::RunNotFound(run_id),
            CollectError::TaskNotFound(task_id) => Self::TaskNotFound(task_id.to_string()),
            CollectError::InvalidResult(msg) => Self::InvalidResult(msg),
            CollectError::Registry(e) => e.into(),
        }
    }
}
