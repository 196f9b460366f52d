//! Result collector - correlates inbound task results with their runs.
//!
//! Ingestion order: parse the task id, validate the payload, look up the
//! owning run, upsert the raw result, then fold it into the run aggregate.
//! Every rejection is logged before it is returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use briefrun_core::{CoreError, FoldOutcome, ResultStatus, RunId, RunStatus, TaskId, TaskResult};

use crate::registry::{RegistryError, RunRegistry};

/// Collector errors.
#[derive(Debug, Clone, Error)]
pub enum CollectError {
    #[error("Malformed task id: {0}")]
    MalformedTaskId(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What an accepted result did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub task_id: TaskId,
    pub run_id: RunId,
    /// Status carried by this delivery.
    pub status: ResultStatus,
    pub fold: FoldOutcome,
    pub run_status: RunStatus,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
}

/// Result collector.
pub struct ResultCollector {
    registry: Arc<RunRegistry>,
}

impl ResultCollector {
    pub fn new(registry: Arc<RunRegistry>) -> Self {
        Self { registry }
    }

    /// Ingest one result reported for `raw_task_id`.
    pub async fn ingest(
        &self,
        raw_task_id: &str,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt, CollectError> {
        let task_id = TaskId::parse(raw_task_id).map_err(|e| {
            warn!(task_id = %raw_task_id, error = %e, "Rejected result with malformed task id");
            CollectError::MalformedTaskId(raw_task_id.to_string())
        })?;

        let result = TaskResult::from_payload(task_id.clone(), payload, now).map_err(|e| {
            warn!(task_id = %task_id, error = %e, "Rejected result with invalid payload");
            CollectError::InvalidResult(e.to_string())
        })?;

        let run = match self.registry.get(task_id.run_id()).await {
            Ok(run) => run,
            Err(RegistryError::NotFound(run_id)) => {
                warn!(task_id = %task_id, run_id = %run_id, "Rejected result for unknown run");
                return Err(CollectError::RunNotFound(run_id));
            }
            Err(e) => return Err(self.storage_failure(&task_id, e)),
        };

        if run.task(task_id.ordinal()).is_none() {
            warn!(
                task_id = %task_id,
                run_id = %run.id,
                total_tasks = run.tasks.len(),
                "Rejected result for unknown task"
            );
            return Err(CollectError::TaskNotFound(task_id));
        }

        self.registry
            .put_result(&result)
            .await
            .map_err(|e| self.storage_failure(&task_id, e))?;

        let (run, fold) = match self.registry.fold_result(&task_id, result.status, now).await {
            Ok(folded) => folded,
            Err(RegistryError::Domain(CoreError::TaskNotFound(_))) => {
                return Err(CollectError::TaskNotFound(task_id));
            }
            Err(e) => return Err(self.storage_failure(&task_id, e)),
        };

        let counted = match fold {
            FoldOutcome::Recorded | FoldOutcome::Duplicate => result.status,
            FoldOutcome::Conflicting { recorded } => recorded,
        };
        if let Err(e) = self.registry.annotate_result(&task_id, counted).await {
            warn!(task_id = %task_id, error = %e, "Failed to annotate stored result");
        }

        match fold {
            FoldOutcome::Recorded => info!(
                task_id = %task_id,
                run_id = %run.id,
                status = %result.status.as_str(),
                run_status = %run.status.as_str(),
                "Task result recorded"
            ),
            FoldOutcome::Duplicate => info!(
                task_id = %task_id,
                run_id = %run.id,
                "Duplicate task result, aggregate unchanged"
            ),
            FoldOutcome::Conflicting { recorded } => warn!(
                task_id = %task_id,
                run_id = %run.id,
                recorded = %recorded.as_str(),
                delivered = %result.status.as_str(),
                "Conflicting task result ignored, first outcome kept"
            ),
        }

        Ok(IngestReceipt {
            run_id: run.id.clone(),
            task_id,
            status: result.status,
            fold,
            run_status: run.status,
            completed_tasks: run.completed_tasks(),
            pending_tasks: run.pending_tasks(),
        })
    }

    fn storage_failure(&self, task_id: &TaskId, err: RegistryError) -> CollectError {
        warn!(task_id = %task_id, error = %err, "Result not ingested, storage failure");
        CollectError::Registry(err)
    }
}
