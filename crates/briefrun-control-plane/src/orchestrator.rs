//! Orchestrator - the boundary contract of the control plane.
//!
//! Wires admission, decomposition, run creation, dispatch and result
//! collection together:
//!
//! `Briefing -> RateLimiter -> DecompositionTable -> RunId -> RunRegistry
//! -> TaskDispatcher -> [workers] -> ResultCollector -> RunRegistry`

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use briefrun_core::{
    Briefing, DecompositionTable, DispatchState, Run, RunId, RunStatus, RunView, TaskId,
    TaskView, UsageSnapshot,
};

use crate::collector::{IngestReceipt, ResultCollector};
use crate::dispatcher::TaskDispatcher;
use crate::error::OrchestratorError;
use crate::metrics::Metrics;
use crate::rate_limiter::RateLimiter;
use crate::registry::RunRegistry;

/// Answer to an accepted briefing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefingReceipt {
    pub run_id: RunId,
    pub status: RunStatus,
    pub tasks_count: usize,
    pub dispatched_task_count: usize,
    /// Per-task publish outcome, in task order.
    pub tasks: Vec<TaskView>,
    pub estimated_completion: DateTime<Utc>,
}

/// Raw results stored for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub run_id: RunId,
    /// Result payloads keyed by task id.
    pub results: BTreeMap<String, Value>,
    pub tasks_completed: usize,
}

/// Orchestration engine.
pub struct Orchestrator {
    limiter: RateLimiter,
    decomposer: DecompositionTable,
    registry: Arc<RunRegistry>,
    dispatcher: TaskDispatcher,
    collector: ResultCollector,
    metrics: Metrics,
}

impl Orchestrator {
    pub fn new(
        limiter: RateLimiter,
        decomposer: DecompositionTable,
        registry: Arc<RunRegistry>,
        dispatcher: TaskDispatcher,
    ) -> Self {
        Self {
            limiter,
            decomposer,
            collector: ResultCollector::new(Arc::clone(&registry)),
            registry,
            dispatcher,
            metrics: Metrics::new(),
        }
    }

    /// Counters kept while serving requests.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Admit a briefing, create its run and publish its tasks.
    ///
    /// The request counts against the quotas once at least one task has been
    /// handed to the channel. A briefing whose run could not be stored, or
    /// none of whose tasks could be published, is not counted. In the latter
    /// case the receipt still names the run, now `failed`, with each task's
    /// publish error.
    pub async fn submit_briefing(
        &self,
        briefing: Briefing,
        now: DateTime<Utc>,
    ) -> Result<BriefingReceipt, OrchestratorError> {
        if let Err(e) = briefing.validate() {
            warn!(submitted_by = %briefing.submitted_by, error = %e, "Rejected briefing");
            return Err(e.into());
        }

        let permit = self.limiter.try_acquire(now).map_err(|e| {
            self.metrics.record_quota_rejection();
            OrchestratorError::from(e)
        })?;

        let specs = self.decomposer.decompose(&briefing.text, briefing.priority);
        let mut run = Run::new(RunId::generate(now), &briefing, specs, now)?;

        self.registry.create(&run).await.map_err(|e| {
            warn!(run_id = %run.id, error = %e, "Failed to store new run");
            OrchestratorError::from(e)
        })?;

        info!(
            run_id = %run.id,
            tasks = run.tasks.len(),
            priority = %briefing.priority.as_str(),
            submitted_by = %briefing.submitted_by,
            "Run created"
        );

        let outcomes = self.dispatcher.dispatch(&run, now).await;
        let dispatch: Vec<(TaskId, DispatchState)> = outcomes
            .into_iter()
            .map(|o| (o.task_id, o.state))
            .collect();

        match self.registry.record_dispatch(&run.id, &dispatch, now).await {
            Ok(stored) => run = stored,
            Err(e) => {
                // Messages are already out; keep going with the local view.
                warn!(run_id = %run.id, error = %e, "Failed to record dispatch outcomes");
                for (task_id, state) in &dispatch {
                    run.record_dispatch(task_id, state.clone(), now)?;
                }
            }
        }

        let published = run
            .tasks
            .iter()
            .filter(|t| matches!(t.dispatch, DispatchState::Published { .. }))
            .count();
        self.metrics.record_dispatch(published, run.tasks.len() - published);

        if published == 0 {
            warn!(run_id = %run.id, "No task of the run could be published");
            drop(permit);
        } else {
            permit.commit();
            self.metrics.record_briefing_accepted();
        }

        let view = run.view();
        Ok(BriefingReceipt {
            run_id: view.run_id,
            status: view.status,
            tasks_count: view.total_tasks,
            dispatched_task_count: published,
            tasks: view.tasks,
            estimated_completion: view.estimated_completion,
        })
    }

    /// Ingest a worker's result for `task_id`.
    pub async fn submit_task_result(
        &self,
        task_id: &str,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt, OrchestratorError> {
        match self.collector.ingest(task_id, payload, now).await {
            Ok(receipt) => {
                self.metrics.record_result(receipt.fold);
                Ok(receipt)
            }
            Err(e) => {
                self.metrics.record_result_rejected();
                Err(e.into())
            }
        }
    }

    /// Current view of a run.
    pub async fn get_run_status(&self, run_id: &RunId) -> Result<RunView, OrchestratorError> {
        Ok(self.registry.get(run_id).await?.view())
    }

    /// Raw results reported so far for a run.
    pub async fn get_run_results(&self, run_id: &RunId) -> Result<RunResults, OrchestratorError> {
        // Unknown runs are reported as such rather than as an empty result set.
        self.registry.get(run_id).await?;

        let results: BTreeMap<String, Value> = self
            .registry
            .results(run_id)
            .await?
            .into_iter()
            .map(|r| (r.task_id.to_string(), r.result))
            .collect();

        Ok(RunResults {
            run_id: run_id.clone(),
            tasks_completed: results.len(),
            results,
        })
    }

    /// Quota usage in the periods containing `now`.
    pub fn usage(&self, now: DateTime<Utc>) -> UsageSnapshot {
        self.limiter.usage(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{InMemoryChannel, MessageHandle, PublishError, TaskChannel};
    use crate::rate_limiter::QuotaLimits;
    use crate::store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use briefrun_core::{FoldOutcome, Priority, QuotaKind, TaskMessage, TaskType};
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 11, 0, 0).unwrap()
    }

    fn build(channel: Arc<dyn TaskChannel>, limits: QuotaLimits) -> Orchestrator {
        let store = Arc::new(InMemoryDocumentStore::new());
        let registry = Arc::new(RunRegistry::new(store, Duration::from_secs(5), 64));
        Orchestrator::new(
            RateLimiter::new(limits),
            DecompositionTable::keyword(),
            registry,
            TaskDispatcher::new(channel, "briefrun-tasks", Duration::from_secs(1)),
        )
    }

    fn orchestrator() -> (Orchestrator, Arc<InMemoryChannel>) {
        let channel = Arc::new(InMemoryChannel::new());
        let limits = QuotaLimits {
            monthly: 10_000,
            daily: 500,
        };
        (build(channel.clone(), limits), channel)
    }

    #[tokio::test]
    async fn test_end_to_end_deploy_and_test() {
        let (orchestrator, channel) = orchestrator();
        let mut worker = channel.subscribe("briefrun-tasks").await;

        let briefing = Briefing::new("deploy and test the new cloud service").with_priority(Priority::High);
        let receipt = orchestrator.submit_briefing(briefing, t0()).await.unwrap();

        assert_eq!(receipt.tasks_count, 2);
        assert_eq!(receipt.dispatched_task_count, 2);
        assert_eq!(receipt.status, RunStatus::Dispatched);
        let types: Vec<TaskType> = receipt.tasks.iter().map(|t| t.spec.task_type).collect();
        assert_eq!(types, vec![TaskType::Testing, TaskType::Deployment]);
        assert!(receipt.tasks.iter().all(|t| t.spec.priority == Priority::High));
        assert_eq!(
            receipt.estimated_completion,
            t0() + chrono::Duration::seconds(180 + 120)
        );

        // Play the worker: echo each task id back with a completed result.
        for _ in 0..2 {
            let message = worker.next().await.unwrap();
            assert_eq!(message.run_id, receipt.run_id);
            orchestrator
                .submit_task_result(
                    &message.task_id.to_string(),
                    json!({"status": "completed", "agent": message.task.agent}),
                    t0(),
                )
                .await
                .unwrap();
        }

        let view = orchestrator.get_run_status(&receipt.run_id).await.unwrap();
        assert_eq!(view.status, RunStatus::Completed);
        assert_eq!(view.completed_tasks, 2);

        let results = orchestrator.get_run_results(&receipt.run_id).await.unwrap();
        assert_eq!(results.tasks_completed, 2);
        let first = receipt.run_id.task(0).to_string();
        assert_eq!(results.results[&first]["agent"], "test_runner");
    }

    #[tokio::test]
    async fn test_monthly_quota_rejects_third_briefing() {
        let channel = Arc::new(InMemoryChannel::new());
        let orchestrator = build(channel, QuotaLimits { monthly: 2, daily: 10 });

        for _ in 0..2 {
            orchestrator
                .submit_briefing(Briefing::new("write code"), t0())
                .await
                .unwrap();
        }

        let err = orchestrator
            .submit_briefing(Briefing::new("write code"), t0())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::QuotaExceeded {
                kind: QuotaKind::Monthly,
                limit: 2
            }
        ));
        assert_eq!(orchestrator.metrics().snapshot().briefings_quota_rejected, 1);
        assert_eq!(orchestrator.usage(t0()).monthly.used, 2);
    }

    #[tokio::test]
    async fn test_empty_briefing_rejected_without_counting() {
        let (orchestrator, _) = orchestrator();
        let err = orchestrator
            .submit_briefing(Briefing::new("   "), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidBriefing(_)));
        assert_eq!(orchestrator.usage(t0()).daily.used, 0);
    }

    struct Down;

    #[async_trait]
    impl TaskChannel for Down {
        async fn publish(&self, _: &str, _: &TaskMessage) -> Result<MessageHandle, PublishError> {
            Err(PublishError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_unpublishable_run_is_reported_and_not_counted() {
        let orchestrator = build(
            Arc::new(Down),
            QuotaLimits {
                monthly: 10,
                daily: 10,
            },
        );

        let receipt = orchestrator
            .submit_briefing(Briefing::new("deploy and test"), t0())
            .await
            .unwrap();
        assert_eq!(receipt.status, RunStatus::Failed);
        assert_eq!(receipt.tasks_count, 2);
        assert_eq!(receipt.dispatched_task_count, 0);
        assert!(receipt.tasks.iter().all(|t| matches!(
            &t.dispatch,
            DispatchState::PublishFailed { error } if error.contains("connection refused")
        )));

        // The stored run is the one the caller was told about.
        let view = orchestrator.get_run_status(&receipt.run_id).await.unwrap();
        assert_eq!(view.status, RunStatus::Failed);

        assert_eq!(orchestrator.usage(t0()).monthly.used, 0);
        let metrics = orchestrator.metrics().snapshot();
        assert_eq!(metrics.publish_failures, 2);
        assert_eq!(metrics.briefings_accepted, 0);
    }

    #[tokio::test]
    async fn test_duplicate_result_does_not_change_counts() {
        let (orchestrator, _) = orchestrator();
        let receipt = orchestrator
            .submit_briefing(Briefing::new("code and test"), t0())
            .await
            .unwrap();
        let task_id = receipt.run_id.task(1).to_string();
        let payload = json!({"status": "success"});

        orchestrator
            .submit_task_result(&task_id, payload.clone(), t0())
            .await
            .unwrap();
        let second = orchestrator
            .submit_task_result(&task_id, payload, t0())
            .await
            .unwrap();

        assert_eq!(second.fold, FoldOutcome::Duplicate);
        let view = orchestrator.get_run_status(&receipt.run_id).await.unwrap();
        assert_eq!(view.completed_tasks, 1);
        assert_eq!(view.status, RunStatus::PartiallyCompleted);
    }

    #[tokio::test]
    async fn test_result_errors_surface() {
        let (orchestrator, _) = orchestrator();

        let err = orchestrator
            .submit_task_result("not-a-task", json!({}), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedTaskId(_)));

        let err = orchestrator
            .submit_task_result("1757502000_000000000000_task_3", json!({}), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::RunNotFound(_)));
        assert!(!err.is_retryable());

        assert_eq!(orchestrator.metrics().snapshot().results_rejected, 2);
    }

    #[tokio::test]
    async fn test_unknown_run_lookups() {
        let (orchestrator, _) = orchestrator();
        let missing = RunId::new("missing");
        assert!(matches!(
            orchestrator.get_run_status(&missing).await,
            Err(OrchestratorError::RunNotFound(_))
        ));
        assert!(matches!(
            orchestrator.get_run_results(&missing).await,
            Err(OrchestratorError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_error_result_fails_run() {
        let (orchestrator, _) = orchestrator();
        let receipt = orchestrator
            .submit_briefing(Briefing::new("deploy and test"), t0())
            .await
            .unwrap();

        orchestrator
            .submit_task_result(&receipt.run_id.task(0).to_string(), json!({"status": "failed"}), t0())
            .await
            .unwrap();
        orchestrator
            .submit_task_result(&receipt.run_id.task(1).to_string(), json!({}), t0())
            .await
            .unwrap();

        let view = orchestrator.get_run_status(&receipt.run_id).await.unwrap();
        assert_eq!(view.status, RunStatus::Failed);
        assert_eq!(view.failed_tasks, 1);
        assert_eq!(view.completed_tasks, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_respect_daily_quota() {
        let channel = Arc::new(InMemoryChannel::new());
        let orchestrator = Arc::new(build(
            channel,
            QuotaLimits {
                monthly: 1_000,
                daily: 5,
            },
        ));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    orchestrator
                        .submit_briefing(Briefing::new(format!("deploy service {i}")), t0())
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 5);
        assert_eq!(orchestrator.usage(t0()).daily.used, 5);
    }
}
