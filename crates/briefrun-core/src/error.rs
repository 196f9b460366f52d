//! Core domain errors.

use thiserror::Error;

/// Core domain errors for BriefRun.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A task id does not carry a parseable `_task_<ordinal>` suffix.
    #[error("Malformed task id: {0}")]
    MalformedTaskId(String),

    /// Task ordinal does not exist in its run.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Briefing text was empty.
    #[error("Briefing text is empty")]
    EmptyBriefing,

    /// A run would exceed the number of tasks its id scheme can order.
    #[error("Too many tasks for one run: {count} (max {max})")]
    TooManyTasks { count: usize, max: usize },

    /// Result payload carries a status we do not understand.
    #[error("Invalid result status: {0}")]
    InvalidResultStatus(String),

    /// Unknown priority name.
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
