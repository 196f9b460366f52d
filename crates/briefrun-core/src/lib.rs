//! BriefRun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Storage
//! - Runtime specifics
//!
//! All types here represent the core business domain of BriefRun: briefings,
//! their decomposition into tasks, run aggregates and usage accounting.

pub mod briefing;
pub mod error;
pub mod ids;
pub mod message;
pub mod run;
pub mod status;
pub mod task;
pub mod usage;

// Re-export commonly used types
pub use briefing::{
    Briefing, DecompositionKind, DecompositionRule, DecompositionTable, DescriptionTemplate,
};
pub use error::CoreError;
pub use ids::{RunId, TaskId, MAX_TASKS_PER_RUN, TASK_ID_DELIMITER};
pub use message::TaskMessage;
pub use run::{FoldOutcome, Run, RunTask, RunView, TaskOutcome, TaskResult, TaskView};
pub use status::{DispatchState, ResultStatus, RunStatus};
pub use task::{Priority, TaskSpec, TaskType};
pub use usage::{QuotaKind, QuotaUsage, UsageSnapshot};
