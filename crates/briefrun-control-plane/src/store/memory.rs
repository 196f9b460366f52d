//! In-process document store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError, StoreResult, Versioned, ABSENT};

type Collection = BTreeMap<String, Versioned>;

/// Thread-safe in-memory document store.
///
/// Each collection is an ordered map so prefix scans come back in key order.
/// All writes happen under one lock, which makes every per-key operation
/// atomic.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

fn not_found(collection: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, collection: &str, key: &str, record: Value) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let version = docs.get(key).map_or(ABSENT, |d| d.version) + 1;
        docs.insert(key.to_string(), Versioned { version, record });
        Ok(version)
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Versioned>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(key)).cloned())
    }

    async fn update(&self, collection: &str, key: &str, fields: Map<String, Value>) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| not_found(collection, key))?;

        match &mut doc.record {
            Value::Object(existing) => existing.extend(fields),
            other => *other = Value::Object(fields),
        }
        doc.version += 1;
        Ok(doc.version)
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        key: &str,
        expected: u64,
        record: Value,
    ) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let actual = docs.get(key).map_or(ABSENT, |d| d.version);

        if actual != expected {
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected,
                actual,
            });
        }

        let version = actual + 1;
        docs.insert(key.to_string(), Versioned { version, record });
        Ok(version)
    }

    async fn scan_prefix(&self, collection: &str, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, doc)| (key.clone(), doc.record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_bumps_version() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.get("runs", "a").await.unwrap(), None);

        assert_eq!(store.put("runs", "a", json!({"n": 1})).await.unwrap(), 1);
        assert_eq!(store.put("runs", "a", json!({"n": 2})).await.unwrap(), 2);

        let doc = store.get("runs", "a").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.record, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryDocumentStore::new();
        store.put("runs", "a", json!({"keep": true, "n": 1})).await.unwrap();

        let mut fields = Map::new();
        fields.insert("n".into(), json!(5));
        fields.insert("extra".into(), json!("x"));
        store.update("runs", "a", fields).await.unwrap();

        let doc = store.get("runs", "a").await.unwrap().unwrap();
        assert_eq!(doc.record, json!({"keep": true, "n": 5, "extra": "x"}));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.update("runs", "nope", Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = InMemoryDocumentStore::new();

        let v1 = store.compare_and_swap("runs", "a", ABSENT, json!(1)).await.unwrap();
        assert_eq!(v1, 1);

        // Create-if-absent fails once the document exists.
        let err = store
            .compare_and_swap("runs", "a", ABSENT, json!(2))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                key: "a".into(),
                expected: 0,
                actual: 1
            }
        );

        assert_eq!(store.compare_and_swap("runs", "a", v1, json!(3)).await.unwrap(), 2);
        assert!(store.compare_and_swap("runs", "a", v1, json!(4)).await.is_err());
        assert_eq!(store.get("runs", "a").await.unwrap().unwrap().record, json!(3));
    }

    #[tokio::test]
    async fn test_scan_prefix_in_key_order() {
        let store = InMemoryDocumentStore::new();
        for key in ["r1_task_0010", "r1_task_0002", "r10_task_0000", "r1_task_0000", "r2_task_0000"] {
            store.put("results", key, json!(key)).await.unwrap();
        }

        let keys: Vec<String> = store
            .scan_prefix("results", "r1_task_")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["r1_task_0000", "r1_task_0002", "r1_task_0010"]);

        assert!(store.scan_prefix("missing", "x").await.unwrap().is_empty());
        assert_eq!(store.len("results").await, 5);
    }
}
