//! Task descriptor types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Kind of work a task asks an agent to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    Testing,
    Deployment,
    GeneralAnalysis,
    Research,
    Execution,
    /// Catch-all task emitted when no keyword matched.
    #[serde(alias = "generic")]
    General,
}

impl TaskType {
    /// Wire name of the task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::Testing => "testing",
            Self::Deployment => "deployment",
            Self::GeneralAnalysis => "general_analysis",
            Self::Research => "research",
            Self::Execution => "execution",
            Self::General => "general",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a run or task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Wire name of the priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(CoreError::InvalidPriority(s.to_string())),
        }
    }
}

/// One unit of decomposed work. Immutable once the run is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Kind of work.
    #[serde(rename = "type")]
    pub task_type: TaskType,

    /// Free-text instructions for the agent.
    pub description: String,

    /// Agent class expected to pick the task up.
    pub agent: String,

    /// Task priority.
    pub priority: Priority,

    /// Rough duration estimate in seconds.
    pub estimated_duration_secs: u64,
}

impl TaskSpec {
    /// Create a new TaskSpec.
    pub fn new(
        task_type: TaskType,
        description: impl Into<String>,
        agent: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            task_type,
            description: description.into(),
            agent: agent.into(),
            priority,
            estimated_duration_secs: 0,
        }
    }

    /// Builder method to set the duration estimate.
    pub fn with_estimated_duration(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }
}
