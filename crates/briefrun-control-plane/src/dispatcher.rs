//! Task dispatcher - publishes a run's tasks to the outbound channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{info, warn};

use briefrun_core::{DispatchState, Run, TaskId, TaskMessage};

use crate::channel::{PublishError, TaskChannel};

/// Publish result for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub task_id: TaskId,
    pub state: DispatchState,
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self.state, DispatchState::Published { .. })
    }
}

/// Task dispatcher.
pub struct TaskDispatcher {
    channel: Arc<dyn TaskChannel>,
    topic: String,
    timeout: Duration,
}

impl TaskDispatcher {
    /// Create a dispatcher publishing to `topic`.
    pub fn new(channel: Arc<dyn TaskChannel>, topic: impl Into<String>, timeout: Duration) -> Self {
        Self {
            channel,
            topic: topic.into(),
            timeout,
        }
    }

    /// Publish every task of `run`, one message per task.
    ///
    /// Publishing is best-effort per task: a failure is reported in that
    /// task's outcome and never stops the others. Outcomes come back in task
    /// order.
    pub async fn dispatch(&self, run: &Run, now: DateTime<Utc>) -> Vec<PublishOutcome> {
        let publishes = run.tasks.iter().map(|task| {
            let message = TaskMessage::new(&run.id, task.task_id.ordinal(), task.spec.clone(), now);
            async move {
                let state = self.publish(&message).await;
                PublishOutcome {
                    task_id: message.task_id,
                    state,
                }
            }
        });

        let outcomes = join_all(publishes).await;
        let published = outcomes.iter().filter(|o| o.is_published()).count();

        info!(
            run_id = %run.id,
            topic = %self.topic,
            published,
            failed = outcomes.len() - published,
            "Dispatched run tasks"
        );

        outcomes
    }

    async fn publish(&self, message: &TaskMessage) -> DispatchState {
        let result = match tokio::time::timeout(self.timeout, self.channel.publish(&self.topic, message)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(millis(self.timeout))),
        };

        match result {
            Ok(handle) => {
                info!(
                    task_id = %message.task_id,
                    agent = %message.task.agent,
                    message_id = %handle,
                    "Task published"
                );
                DispatchState::Published {
                    message_id: handle.to_string(),
                }
            }
            Err(e) => {
                warn!(task_id = %message.task_id, error = %e, "Failed to publish task");
                DispatchState::PublishFailed { error: e.to_string() }
            }
        }
    }
}

/// Whole milliseconds in `d`, saturating.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{InMemoryChannel, MessageHandle};
    use async_trait::async_trait;
    use briefrun_core::{Briefing, DecompositionTable, Priority, RunId};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 30, 0).unwrap()
    }

    fn run(text: &str) -> Run {
        let briefing = Briefing::new(text).with_priority(Priority::Medium);
        let specs = DecompositionTable::keyword().decompose(&briefing.text, briefing.priority);
        Run::new(RunId::new("1741000000_aaaaaaaaaaaa"), &briefing, specs, now()).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_publishes_in_order() {
        let channel = Arc::new(InMemoryChannel::new());
        let dispatcher = TaskDispatcher::new(channel.clone(), "tasks", Duration::from_secs(1));
        let run = run("Write code, test it and deploy to the cloud");

        let outcomes = dispatcher.dispatch(&run, now()).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(PublishOutcome::is_published));

        let ordinals: Vec<u32> = outcomes.iter().map(|o| o.task_id.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);

        let messages = channel.published("tasks").await;
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.run_id == run.id));
        assert_eq!(messages[1].task.agent, "test_runner");
    }

    /// Channel refusing every message for one agent.
    struct Refusing {
        agent: &'static str,
        inner: InMemoryChannel,
    }

    #[async_trait]
    impl TaskChannel for Refusing {
        async fn publish(&self, topic: &str, message: &TaskMessage) -> Result<MessageHandle, PublishError> {
            if message.task.agent == self.agent {
                return Err(PublishError::Rejected("topic closed".into()));
            }
            self.inner.publish(topic, message).await
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_tasks() {
        let channel = Arc::new(Refusing {
            agent: "test_runner",
            inner: InMemoryChannel::new(),
        });
        let dispatcher = TaskDispatcher::new(channel, "tasks", Duration::from_secs(1));
        let run = run("Write code, test it and deploy to the cloud");

        let outcomes = dispatcher.dispatch(&run, now()).await;
        assert!(outcomes[0].is_published());
        assert!(matches!(
            &outcomes[1].state,
            DispatchState::PublishFailed { error } if error.contains("topic closed")
        ));
        assert!(outcomes[2].is_published());
    }

    struct Silent;

    #[async_trait]
    impl TaskChannel for Silent {
        async fn publish(&self, _: &str, _: &TaskMessage) -> Result<MessageHandle, PublishError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_unanswered_publish_times_out() {
        let dispatcher = TaskDispatcher::new(Arc::new(Silent), "tasks", Duration::from_millis(20));
        let outcomes = dispatcher.dispatch(&run("deploy"), now()).await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0].state,
            DispatchState::PublishFailed { error } if error.contains("timed out after 20 ms")
        ));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
