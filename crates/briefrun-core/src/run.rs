//! Run aggregate and its result fold.
//!
//! A Run owns the ordered task list of one briefing. Results reported by
//! workers are folded in one task at a time; the fold is idempotent and the
//! aggregate status only moves forward.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::briefing::Briefing;
use crate::error::CoreError;
use crate::ids::{RunId, TaskId, MAX_TASKS_PER_RUN};
use crate::status::{DispatchState, ResultStatus, RunStatus};
use crate::task::{Priority, TaskSpec};

/// Recorded outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: ResultStatus,
    pub recorded_at: DateTime<Utc>,
}

/// A task inside a run, with its dispatch state and outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTask {
    pub task_id: TaskId,
    pub spec: TaskSpec,
    #[serde(default)]
    pub dispatch: DispatchState,
    #[serde(default)]
    pub outcome: Option<TaskOutcome>,
}

impl RunTask {
    fn awaiting_result(&self) -> bool {
        self.outcome.is_none() && self.dispatch.expects_result()
    }
}

/// What folding a result did to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// First result for the task; aggregate updated.
    Recorded,
    /// Same status already recorded; aggregate unchanged.
    Duplicate,
    /// A different status was already recorded and is kept.
    Conflicting { recorded: ResultStatus },
}

/// One end-to-end orchestration request derived from a single briefing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub briefing: String,
    pub priority: Priority,
    pub submitted_by: String,
    pub tasks: Vec<RunTask>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a run owning `specs`, in order.
    pub fn new(
        id: RunId,
        briefing: &Briefing,
        specs: Vec<TaskSpec>,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if specs.len() > MAX_TASKS_PER_RUN {
            return Err(CoreError::TooManyTasks {
                count: specs.len(),
                max: MAX_TASKS_PER_RUN,
            });
        }

        let tasks = specs
            .into_iter()
            .enumerate()
            .map(|(ordinal, spec)| RunTask {
                // Bounded by MAX_TASKS_PER_RUN above.
                task_id: id.task(ordinal as u32),
                spec,
                dispatch: DispatchState::Pending,
                outcome: None,
            })
            .collect();

        Ok(Self {
            id,
            briefing: briefing.text.clone(),
            priority: briefing.priority,
            submitted_by: briefing.submitted_by.clone(),
            tasks,
            status: RunStatus::Created,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up a task by ordinal.
    pub fn task(&self, ordinal: u32) -> Option<&RunTask> {
        self.tasks.get(ordinal as usize)
    }

    fn task_mut(&mut self, task_id: &TaskId) -> Result<&mut RunTask, CoreError> {
        if task_id.run_id() != &self.id {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        self.tasks
            .get_mut(task_id.ordinal() as usize)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    /// Record what the channel said about one task.
    pub fn record_dispatch(
        &mut self,
        task_id: &TaskId,
        state: DispatchState,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let task = self.task_mut(task_id)?;
        if task.dispatch == DispatchState::Pending {
            task.dispatch = state;
        }
        self.touch(now);
        self.refresh_status();
        Ok(())
    }

    /// Fold one task result into the aggregate.
    ///
    /// The first outcome recorded for a task wins. Re-delivering a result is
    /// harmless: counts and status stay as they were, only `updated_at` moves.
    pub fn apply_result(
        &mut self,
        task_id: &TaskId,
        status: ResultStatus,
        now: DateTime<Utc>,
    ) -> Result<FoldOutcome, CoreError> {
        let task = self.task_mut(task_id)?;

        let outcome = match task.outcome {
            None => {
                task.outcome = Some(TaskOutcome {
                    status,
                    recorded_at: now,
                });
                FoldOutcome::Recorded
            }
            Some(existing) if existing.status == status => FoldOutcome::Duplicate,
            Some(existing) => FoldOutcome::Conflicting {
                recorded: existing.status,
            },
        };

        self.touch(now);
        self.refresh_status();
        Ok(outcome)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    fn refresh_status(&mut self) {
        let next = self.computed_status();
        self.status = self.status.advance(next);
    }

    fn computed_status(&self) -> RunStatus {
        let any_outcome = self.tasks.iter().any(|t| t.outcome.is_some());
        let expected = self.expected_tasks();

        if expected == 0 {
            // Nothing reached the channel, nothing will report back.
            return RunStatus::Failed;
        }

        if !any_outcome {
            let any_published = self
                .tasks
                .iter()
                .any(|t| matches!(t.dispatch, DispatchState::Published { .. }));
            return if any_published {
                RunStatus::Dispatched
            } else {
                RunStatus::Created
            };
        }

        if self.pending_tasks() > 0 {
            RunStatus::PartiallyCompleted
        } else if self.failed_tasks() > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    /// Tasks a result is expected for (publish did not fail).
    pub fn expected_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.dispatch.expects_result()).count()
    }

    /// Expected tasks still without a recorded result.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.awaiting_result()).count()
    }

    /// Tasks whose recorded outcome is `completed`.
    pub fn completed_tasks(&self) -> usize {
        self.count_outcomes(ResultStatus::Completed)
    }

    /// Tasks whose recorded outcome is `error`.
    pub fn failed_tasks(&self) -> usize {
        self.count_outcomes(ResultStatus::Error)
    }

    fn count_outcomes(&self, status: ResultStatus) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.outcome.is_some_and(|o| o.status == status))
            .count()
    }

    /// Sum of all task duration estimates.
    pub fn estimated_duration_secs(&self) -> u64 {
        self.tasks.iter().map(|t| t.spec.estimated_duration_secs).sum()
    }

    /// Creation time plus the summed task estimates.
    pub fn estimated_completion(&self) -> DateTime<Utc> {
        i64::try_from(self.estimated_duration_secs())
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| self.created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Read-only projection returned to callers.
    pub fn view(&self) -> RunView {
        RunView {
            run_id: self.id.clone(),
            status: self.status,
            briefing: self.briefing.clone(),
            priority: self.priority,
            submitted_by: self.submitted_by.clone(),
            total_tasks: self.tasks.len(),
            expected_tasks: self.expected_tasks(),
            completed_tasks: self.completed_tasks(),
            failed_tasks: self.failed_tasks(),
            pending_tasks: self.pending_tasks(),
            tasks: self.tasks.iter().map(TaskView::from).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            estimated_completion: self.estimated_completion(),
        }
    }
}

/// Caller-facing view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunView {
    pub run_id: RunId,
    pub status: RunStatus,
    pub briefing: String,
    pub priority: Priority,
    pub submitted_by: String,
    pub total_tasks: usize,
    pub expected_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub pending_tasks: usize,
    pub tasks: Vec<TaskView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
}

/// Caller-facing view of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub spec: TaskSpec,
    pub dispatch: DispatchState,
    pub result_status: Option<ResultStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&RunTask> for TaskView {
    fn from(task: &RunTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            spec: task.spec.clone(),
            dispatch: task.dispatch.clone(),
            result_status: task.outcome.map(|o| o.status),
            completed_at: task.outcome.map(|o| o.recorded_at),
        }
    }
}

/// Raw result reported by a worker, stored keyed by task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub run_id: RunId,
    pub status: ResultStatus,
    pub result: Value,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    /// Build a result record from a worker payload.
    pub fn from_payload(task_id: TaskId, payload: Value, now: DateTime<Utc>) -> Result<Self, CoreError> {
        let status = ResultStatus::from_payload(&payload)?;
        Ok(Self {
            run_id: task_id.run_id().clone(),
            task_id,
            status,
            result: payload,
            completed_at: now,
        })
    }
}
