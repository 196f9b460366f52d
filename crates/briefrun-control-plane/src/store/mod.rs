//! Document store port.
//!
//! Runs and task results are persisted as JSON documents addressed by
//! `(collection, key)`. Every write bumps the document's version, which lets
//! callers do optimistic read-modify-write through [`DocumentStore::compare_and_swap`].

mod memory;

pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Version a document has before it exists.
pub const ABSENT: u64 = 0;

/// A document together with its current version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub version: u64,
    pub record: Value,
}

/// Key/value document persistence contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document. Returns the new version.
    async fn put(&self, collection: &str, key: &str, record: Value) -> StoreResult<u64>;

    /// Fetch a document, or `None` if absent.
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Versioned>>;

    /// Atomically merge top-level `fields` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist.
    async fn update(&self, collection: &str, key: &str, fields: Map<String, Value>) -> StoreResult<u64>;

    /// Replace a document only if its version is still `expected`.
    ///
    /// `expected == ABSENT` means "create, and fail if it already exists".
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] when another writer got there
    /// first.
    async fn compare_and_swap(
        &self,
        collection: &str,
        key: &str,
        expected: u64,
        record: Value,
    ) -> StoreResult<u64>;

    /// All documents whose key starts with `prefix`, in key order.
    async fn scan_prefix(&self, collection: &str, prefix: &str) -> StoreResult<Vec<(String, Value)>>;
}

/// Errors returned by document store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("document not found: {collection}/{key}")]
    NotFound { collection: String, key: String },

    /// Optimistic write lost a race.
    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict { key: String, expected: u64, actual: u64 },

    /// Backend could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("store error: {0}")]
    Backend(String),
}
