//! Run registry - owns run records in the document store.
//!
//! Runs live in the `runs` collection keyed by run id; raw task results live
//! in `task_results` keyed by task id. Every change to a run is a versioned
//! read-modify-write, retried on conflict, so results for the same run can be
//! folded concurrently without lost updates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use briefrun_core::{
    CoreError, DispatchState, FoldOutcome, ResultStatus, Run, RunId, TaskId, TaskResult,
};
use chrono::{DateTime, Utc};

use crate::store::{DocumentStore, StoreError, ABSENT};

/// Collection holding run records.
pub const RUNS: &str = "runs";

/// Collection holding raw task results.
pub const TASK_RESULTS: &str = "task_results";

/// Registry errors.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Run not found: {0}")]
    NotFound(RunId),

    #[error("Run already exists: {0}")]
    AlreadyExists(RunId),

    #[error("Run {run_id} still contended after {attempts} attempts")]
    Contended { run_id: RunId, attempts: u32 },

    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Run registry over an abstract document store.
pub struct RunRegistry {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
    max_attempts: u32,
}

impl RunRegistry {
    /// Create a registry.
    ///
    /// `timeout` bounds every store call; `max_attempts` bounds optimistic
    /// retries of one read-modify-write.
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            store,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn call<T>(&self, op: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, op).await.map_err(|_| {
            StoreError::Unavailable(format!("no answer within {} ms", self.timeout.as_millis()))
        })?
    }

    /// Store a new run. Fails if the id is already taken.
    pub async fn create(&self, run: &Run) -> Result<(), RegistryError> {
        let record = encode(run)?;
        match self
            .call(self.store.compare_and_swap(RUNS, run.id.as_str(), ABSENT, record))
            .await
        {
            Ok(_) => Ok(()),
            Err(StoreError::VersionConflict { .. }) => Err(RegistryError::AlreadyExists(run.id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a run.
    pub async fn get(&self, run_id: &RunId) -> Result<Run, RegistryError> {
        let doc = self
            .call(self.store.get(RUNS, run_id.as_str()))
            .await?
            .ok_or_else(|| RegistryError::NotFound(run_id.clone()))?;
        decode(doc.record)
    }

    /// Apply `change` to a run atomically, retrying on concurrent writes.
    ///
    /// `change` may run more than once and must only depend on the run it is
    /// given.
    pub async fn modify<T, F>(&self, run_id: &RunId, mut change: F) -> Result<(Run, T), RegistryError>
    where
        F: FnMut(&mut Run) -> Result<T, CoreError> + Send,
        T: Send,
    {
        for attempt in 1..=self.max_attempts {
            let doc = self
                .call(self.store.get(RUNS, run_id.as_str()))
                .await?
                .ok_or_else(|| RegistryError::NotFound(run_id.clone()))?;

            let mut run = decode(doc.record)?;
            let value = change(&mut run)?;
            let record = encode(&run)?;

            match self
                .call(self.store.compare_and_swap(RUNS, run_id.as_str(), doc.version, record))
                .await
            {
                Ok(_) => return Ok((run, value)),
                Err(StoreError::VersionConflict { expected, actual, .. }) => {
                    debug!(run_id = %run_id, attempt, expected, actual, "Run update conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RegistryError::Contended {
            run_id: run_id.clone(),
            attempts: self.max_attempts,
        })
    }

    /// Record per-task publish outcomes.
    pub async fn record_dispatch(
        &self,
        run_id: &RunId,
        outcomes: &[(TaskId, DispatchState)],
        now: DateTime<Utc>,
    ) -> Result<Run, RegistryError> {
        let (run, ()) = self
            .modify(run_id, |run| {
                for (task_id, state) in outcomes {
                    run.record_dispatch(task_id, state.clone(), now)?;
                }
                Ok(())
            })
            .await?;
        Ok(run)
    }

    /// Fold one task result into its run.
    pub async fn fold_result(
        &self,
        task_id: &TaskId,
        status: ResultStatus,
        now: DateTime<Utc>,
    ) -> Result<(Run, FoldOutcome), RegistryError> {
        self.modify(task_id.run_id(), |run| run.apply_result(task_id, status, now))
            .await
    }

    /// Upsert the raw result document for a task.
    pub async fn put_result(&self, result: &TaskResult) -> Result<(), RegistryError> {
        let record = serde_json::to_value(result).map_err(|e| RegistryError::Storage(e.to_string()))?;
        self.call(self.store.put(TASK_RESULTS, &result.task_id.to_string(), record))
            .await?;
        Ok(())
    }

    /// Note on the raw result which status the run aggregate counted.
    pub async fn annotate_result(&self, task_id: &TaskId, counted: ResultStatus) -> Result<(), RegistryError> {
        let mut fields = Map::new();
        fields.insert("counted_status".into(), Value::from(counted.as_str()));
        self.call(self.store.update(TASK_RESULTS, &task_id.to_string(), fields))
            .await?;
        Ok(())
    }

    /// All raw results stored for a run, in ordinal order.
    pub async fn results(&self, run_id: &RunId) -> Result<Vec<TaskResult>, RegistryError> {
        let docs = self
            .call(self.store.scan_prefix(TASK_RESULTS, &run_id.task_prefix()))
            .await?;

        let mut results = Vec::with_capacity(docs.len());
        for (key, record) in docs {
            let result: TaskResult = serde_json::from_value(record)
                .map_err(|e| RegistryError::Storage(format!("corrupt result {key}: {e}")))?;
            // A run id that itself contains the delimiter can share our prefix.
            if result.run_id == *run_id {
                results.push(result);
            }
        }
        Ok(results)
    }
}

fn encode(run: &Run) -> Result<Value, RegistryError> {
    serde_json::to_value(run).map_err(|e| RegistryError::Storage(format!("encode run {}: {e}", run.id)))
}

fn decode(record: Value) -> Result<Run, RegistryError> {
    serde_json::from_value(record).map_err(|e| RegistryError::Storage(format!("corrupt run record: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDocumentStore, StoreResult, Versioned};
    use async_trait::async_trait;
    use briefrun_core::{Briefing, DecompositionTable, Priority, RunStatus};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn registry() -> RunRegistry {
        RunRegistry::new(Arc::new(InMemoryDocumentStore::new()), Duration::from_secs(1), 8)
    }

    fn run(id: &str, text: &str) -> Run {
        let briefing = Briefing::new(text).with_priority(Priority::High);
        let specs = DecompositionTable::keyword().decompose(&briefing.text, briefing.priority);
        Run::new(RunId::new(id), &briefing, specs, now()).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let run = run("r1", "deploy and test");
        registry.create(&run).await.unwrap();

        let loaded = registry.get(&run.id).await.unwrap();
        assert_eq!(loaded, run);

        assert!(matches!(
            registry.create(&run).await,
            Err(RegistryError::AlreadyExists(_))
        ));
        assert!(matches!(
            registry.get(&RunId::new("missing")).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fold_result_updates_record() {
        let registry = registry();
        let run = run("r1", "deploy");
        registry.create(&run).await.unwrap();

        let task_id = run.id.task(0);
        let (updated, fold) = registry
            .fold_result(&task_id, ResultStatus::Completed, now())
            .await
            .unwrap();
        assert_eq!(fold, FoldOutcome::Recorded);
        assert_eq!(updated.status, RunStatus::Completed);
        assert_eq!(registry.get(&run.id).await.unwrap().status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_fold_unknown_task_is_domain_error() {
        let registry = registry();
        let run = run("r1", "deploy");
        registry.create(&run).await.unwrap();

        let err = registry
            .fold_result(&run.id.task(4), ResultStatus::Completed, now())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Domain(CoreError::TaskNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_folds_do_not_lose_updates() {
        let registry = Arc::new(RunRegistry::new(
            Arc::new(InMemoryDocumentStore::new()),
            Duration::from_secs(5),
            64,
        ));
        let run = run("r1", "Programming: write code, test it, deploy to the cloud");
        registry.create(&run).await.unwrap();

        let handles: Vec<_> = (0..run.tasks.len() as u32)
            .map(|ordinal| {
                let registry = Arc::clone(&registry);
                let task_id = run.id.task(ordinal);
                tokio::spawn(async move {
                    registry
                        .fold_result(&task_id, ResultStatus::Completed, now())
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = registry.get(&run.id).await.unwrap();
        assert_eq!(stored.completed_tasks(), 3);
        assert_eq!(stored.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_results_filtered_by_owner() {
        let registry = registry();
        let plain = RunId::new("r1");
        let tricky = RunId::new("r1_task_x");

        for task_id in [plain.task(1), plain.task(0), tricky.task(0)] {
            let result = TaskResult::from_payload(task_id, json!({"ok": true}), now()).unwrap();
            registry.put_result(&result).await.unwrap();
        }

        let results = registry.results(&plain).await.unwrap();
        let ordinals: Vec<u32> = results.iter().map(|r| r.task_id.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(registry.results(&tricky).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_annotate_result() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let registry = RunRegistry::new(store.clone(), Duration::from_secs(1), 8);
        let task_id = RunId::new("r1").task(0);
        let result = TaskResult::from_payload(task_id.clone(), json!({"status": "error"}), now()).unwrap();
        registry.put_result(&result).await.unwrap();
        registry.annotate_result(&task_id, ResultStatus::Error).await.unwrap();

        let doc = store.get(TASK_RESULTS, &task_id.to_string()).await.unwrap().unwrap();
        assert_eq!(doc.record["counted_status"], "error");
        assert_eq!(doc.record["status"], "error");
    }

    /// Store that never answers.
    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        async fn put(&self, _: &str, _: &str, _: Value) -> StoreResult<u64> {
            std::future::pending().await
        }
        async fn get(&self, _: &str, _: &str) -> StoreResult<Option<Versioned>> {
            std::future::pending().await
        }
        async fn update(&self, _: &str, _: &str, _: Map<String, Value>) -> StoreResult<u64> {
            std::future::pending().await
        }
        async fn compare_and_swap(&self, _: &str, _: &str, _: u64, _: Value) -> StoreResult<u64> {
            std::future::pending().await
        }
        async fn scan_prefix(&self, _: &str, _: &str) -> StoreResult<Vec<(String, Value)>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_store_times_out_as_unavailable() {
        let registry = RunRegistry::new(Arc::new(StalledStore), Duration::from_millis(20), 3);
        let err = registry.create(&run("r1", "deploy")).await.unwrap_err();
        assert!(matches!(err, RegistryError::StorageUnavailable(_)));
    }

    /// Store whose run document changes under every writer.
    struct AlwaysConflicting(InMemoryDocumentStore);

    #[async_trait]
    impl DocumentStore for AlwaysConflicting {
        async fn put(&self, c: &str, k: &str, r: Value) -> StoreResult<u64> {
            self.0.put(c, k, r).await
        }
        async fn get(&self, c: &str, k: &str) -> StoreResult<Option<Versioned>> {
            self.0.get(c, k).await
        }
        async fn update(&self, c: &str, k: &str, f: Map<String, Value>) -> StoreResult<u64> {
            self.0.update(c, k, f).await
        }
        async fn compare_and_swap(&self, c: &str, k: &str, expected: u64, r: Value) -> StoreResult<u64> {
            if expected == ABSENT {
                return self.0.compare_and_swap(c, k, expected, r).await;
            }
            Err(StoreError::VersionConflict {
                key: k.to_string(),
                expected,
                actual: expected + 1,
            })
        }
        async fn scan_prefix(&self, c: &str, p: &str) -> StoreResult<Vec<(String, Value)>> {
            self.0.scan_prefix(c, p).await
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_contention() {
        let registry = RunRegistry::new(
            Arc::new(AlwaysConflicting(InMemoryDocumentStore::new())),
            Duration::from_secs(1),
            3,
        );
        let run = run("r1", "deploy");
        registry.create(&run).await.unwrap();

        let err = registry
            .fold_result(&run.id.task(0), ResultStatus::Completed, now())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Contended { attempts: 3, .. }));
    }
}
