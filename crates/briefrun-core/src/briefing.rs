//! Briefing decomposition.
//!
//! A briefing is broken into tasks by an ordered rule table. Every rule whose
//! keyword set matches the briefing (case-insensitive substring test) emits
//! one task, in table order; when nothing matches the fallback rule emits a
//! single task. The emitted order is the ordinal basis for task ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::task::{Priority, TaskSpec, TaskType};

/// Free-text statement of intent submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Briefing {
    /// Briefing text.
    pub text: String,

    /// Priority every decomposed task inherits unless a rule overrides it.
    #[serde(default)]
    pub priority: Priority,

    /// Who submitted the briefing.
    #[serde(default = "anonymous")]
    pub submitted_by: String,
}

fn anonymous() -> String {
    "anonymous".to_string()
}

impl Briefing {
    /// Create a briefing with normal priority from an anonymous caller.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::Normal,
            submitted_by: anonymous(),
        }
    }

    /// Builder method to set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method to set the submitter.
    pub fn with_submitter(mut self, user: impl Into<String>) -> Self {
        self.submitted_by = user.into();
        self
    }

    /// Reject briefings with no usable text.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.text.trim().is_empty() {
            return Err(CoreError::EmptyBriefing);
        }
        Ok(())
    }
}

/// How a rule turns the briefing into a task description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionTemplate {
    /// The briefing text verbatim.
    Briefing,
    /// A fixed prefix followed by the briefing text.
    Prefixed(String),
    /// A prefix, the first `max_chars` characters of the briefing, then `...`.
    Excerpt { prefix: String, max_chars: usize },
    /// A fixed description, independent of the briefing.
    Fixed(String),
}

impl DescriptionTemplate {
    fn render(&self, briefing: &str) -> String {
        match self {
            Self::Briefing => briefing.to_string(),
            Self::Prefixed(prefix) => format!("{prefix}{briefing}"),
            Self::Excerpt { prefix, max_chars } => {
                let excerpt: String = briefing.chars().take(*max_chars).collect();
                format!("{prefix}{excerpt}...")
            }
            Self::Fixed(text) => text.clone(),
        }
    }
}

/// One row of the decomposition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompositionRule {
    /// Type of the emitted task.
    pub task_type: TaskType,
    /// Lowercase keywords; any one matching fires the rule. Empty means the
    /// rule always fires.
    pub keywords: Vec<String>,
    /// Agent class assigned to the task.
    pub agent: String,
    /// Fixed duration estimate for this task type.
    pub estimated_duration_secs: u64,
    /// Description template.
    pub description: DescriptionTemplate,
    /// Priority override; `None` inherits the briefing priority.
    pub priority: Option<Priority>,
}

impl DecompositionRule {
    /// Create a rule that fires on any of `keywords`.
    pub fn new(
        task_type: TaskType,
        keywords: &[&str],
        agent: impl Into<String>,
        estimated_duration_secs: u64,
    ) -> Self {
        Self {
            task_type,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            agent: agent.into(),
            estimated_duration_secs,
            description: DescriptionTemplate::Briefing,
            priority: None,
        }
    }

    /// Builder method to set the description template.
    pub fn with_description(mut self, description: DescriptionTemplate) -> Self {
        self.description = description;
        self
    }

    /// Builder method to pin the task priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.is_empty() || self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    fn emit(&self, briefing: &str, priority: Priority) -> TaskSpec {
        TaskSpec::new(
            self.task_type,
            self.description.render(briefing),
            self.agent.clone(),
            self.priority.unwrap_or(priority),
        )
        .with_estimated_duration(self.estimated_duration_secs)
    }
}

/// Ordered, swappable decision table mapping briefing text to tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompositionTable {
    rules: Vec<DecompositionRule>,
    fallback: DecompositionRule,
}

impl DecompositionTable {
    /// Create a table from explicit rules.
    pub fn new(rules: Vec<DecompositionRule>, fallback: DecompositionRule) -> Self {
        Self { rules, fallback }
    }

    /// Topic keyword table: code, testing and deployment work.
    pub fn keyword() -> Self {
        Self::new(
            vec![
                DecompositionRule::new(TaskType::CodeGeneration, &["code", "programming"], "codex", 300),
                DecompositionRule::new(TaskType::Testing, &["test"], "test_runner", 180)
                    .with_description(DescriptionTemplate::Prefixed("Create tests for: ".into())),
                DecompositionRule::new(TaskType::Deployment, &["deploy", "cloud"], "cloud_deployer", 120),
            ],
            DecompositionRule::new(TaskType::General, &[], "general_agent", 240),
        )
    }

    /// Fixed analysis, research and execution plan applied to every briefing.
    pub fn staged() -> Self {
        Self::new(
            vec![
                DecompositionRule::new(TaskType::GeneralAnalysis, &[], "general_agent", 300)
                    .with_description(DescriptionTemplate::Excerpt {
                        prefix: "Analyze briefing: ".into(),
                        max_chars: 100,
                    })
                    .with_priority(Priority::High),
                DecompositionRule::new(TaskType::Research, &[], "research_agent", 600)
                    .with_description(DescriptionTemplate::Fixed(
                        "Gather relevant information and context".into(),
                    ))
                    .with_priority(Priority::Medium),
                DecompositionRule::new(TaskType::Execution, &[], "execution_agent", 900)
                    .with_description(DescriptionTemplate::Fixed(
                        "Execute main task requirements".into(),
                    ))
                    .with_priority(Priority::High),
            ],
            DecompositionRule::new(TaskType::General, &[], "general_agent", 240),
        )
    }

    /// Built-in table by kind.
    pub fn for_kind(kind: DecompositionKind) -> Self {
        match kind {
            DecompositionKind::Keyword => Self::keyword(),
            DecompositionKind::Staged => Self::staged(),
        }
    }

    /// Decompose briefing text into an ordered task list.
    ///
    /// Deterministic: identical input always yields the same tasks in the
    /// same order. Never returns an empty list.
    pub fn decompose(&self, briefing: &str, priority: Priority) -> Vec<TaskSpec> {
        let lowered = briefing.to_lowercase();

        let tasks: Vec<TaskSpec> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(&lowered))
            .map(|rule| rule.emit(briefing, priority))
            .collect();

        if tasks.is_empty() {
            vec![self.fallback.emit(briefing, priority)]
        } else {
            tasks
        }
    }
}

impl Default for DecompositionTable {
    fn default() -> Self {
        Self::keyword()
    }
}

/// Selector for the built-in decomposition tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecompositionKind {
    #[default]
    Keyword,
    Staged,
}

impl fmt::Display for DecompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword => f.write_str("keyword"),
            Self::Staged => f.write_str("staged"),
        }
    }
}

impl FromStr for DecompositionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "staged" => Ok(Self::Staged),
            other => Err(format!("unknown decomposition table '{other}' (expected keyword or staged)")),
        }
    }
}
