//! HTTP request and response types.

use serde::{Deserialize, Serialize};

use briefrun_core::{FoldOutcome, Priority, ResultStatus, RunId, RunStatus, TaskId, UsageSnapshot};

use crate::collector::IngestReceipt;

// ============================================================================
// Briefing types
// ============================================================================

/// Request body for the briefing endpoint.
#[derive(Debug, Deserialize)]
pub struct SubmitBriefingRequest {
    /// Briefing text.
    pub briefing: String,

    /// Priority inherited by every task.
    #[serde(default)]
    pub priority: Priority,
}

// ============================================================================
// Task result types
// ============================================================================

/// Response body for the task result endpoint.
#[derive(Debug, Serialize)]
pub struct TaskResultResponse {
    pub task_id: TaskId,
    pub run_id: RunId,
    pub status: ResultStatus,
    /// `recorded`, `duplicate` or `conflicting`.
    pub ingestion: &'static str,
    pub run_status: RunStatus,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
}

impl From<IngestReceipt> for TaskResultResponse {
    fn from(receipt: IngestReceipt) -> Self {
        let ingestion = match receipt.fold {
            FoldOutcome::Recorded => "recorded",
            FoldOutcome::Duplicate => "duplicate",
            FoldOutcome::Conflicting { .. } => "conflicting",
        };
        Self {
            task_id: receipt.task_id,
            run_id: receipt.run_id,
            status: receipt.status,
            ingestion,
            run_status: receipt.run_status,
            completed_tasks: receipt.completed_tasks,
            pending_tasks: receipt.pending_tasks,
        }
    }
}

// ============================================================================
// Stats types
// ============================================================================

/// Response body for the stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub usage: UsageSnapshot,
    pub timestamp: String,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: String,
}
