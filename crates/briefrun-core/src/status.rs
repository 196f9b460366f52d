//! Status enums for Runs and task results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Aggregate status of a Run.
///
/// Statuses are ordered; a run only ever moves forward through
/// `Created -> Dispatched -> PartiallyCompleted -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run recorded, no task published yet.
    #[default]
    Created,
    /// At least one task handed to the channel.
    Dispatched,
    /// Some, but not all, expected tasks reported back.
    PartiallyCompleted,
    /// Every expected task reported `completed`.
    Completed,
    /// Every expected task reported and at least one reported `error`.
    Failed,
}

impl RunStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Dispatched => 1,
            Self::PartiallyCompleted => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Move towards `next` without ever going backwards.
    ///
    /// Terminal states are sticky: once completed or failed, the run keeps
    /// that status.
    pub fn advance(self, next: RunStatus) -> RunStatus {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Dispatched => "dispatched",
            Self::PartiallyCompleted => "partially_completed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Completion status reported by a worker for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Task finished successfully.
    Completed,
    /// Task finished with an error.
    Error,
}

impl ResultStatus {
    /// Read the completion status out of a raw result payload.
    ///
    /// A payload without a `status` field counts as completed.
    pub fn from_payload(payload: &Value) -> Result<Self, CoreError> {
        match payload.get("status") {
            None | Some(Value::Null) => Ok(Self::Completed),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(CoreError::InvalidResultStatus(other.to_string())),
        }
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for ResultStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completed" | "success" => Ok(Self::Completed),
            "error" | "failed" => Ok(Self::Error),
            _ => Err(CoreError::InvalidResultStatus(s.to_string())),
        }
    }
}

/// Where a task stands with respect to the outbound channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
    /// Not yet handed to the channel (or the outcome was never recorded).
    #[default]
    Pending,
    /// Accepted by the channel.
    Published { message_id: String },
    /// The channel refused or timed out.
    PublishFailed { error: String },
}

impl DispatchState {
    /// Returns true if a result is expected for this task.
    pub fn expects_result(&self) -> bool {
        !matches!(self, Self::PublishFailed { .. })
    }
}
