//! Task messages handed to the outbound channel.
//!
//! This is the contract external workers consume. A worker must echo
//! `task_id` back unchanged when it reports a result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RunId, TaskId};
use crate::task::TaskSpec;

/// A dispatched task, as seen by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Run the task belongs to.
    pub run_id: RunId,
    /// Correlation id the worker reports back with.
    pub task_id: TaskId,
    /// The task itself.
    pub task: TaskSpec,
    /// When the message was built.
    pub timestamp: DateTime<Utc>,
}

impl TaskMessage {
    /// Create a message for the task at `ordinal` of `run_id`.
    pub fn new(run_id: &RunId, ordinal: u32, task: TaskSpec, timestamp: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.clone(),
            task_id: run_id.task(ordinal),
            task,
            timestamp,
        }
    }

    /// Encode as JSON bytes for transports that carry opaque payloads.
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::CoreError> {
        serde_json::to_vec(self).map_err(|e| crate::CoreError::Serialization(e.to_string()))
    }
}
