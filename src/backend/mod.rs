//! Backend Module
//!
//! The storage capability the store guard sits in front of, plus an
//! in-memory implementation with TTL support and fault injection.

mod entry;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::BackendError;

pub use entry::StoredEntry;
pub use memory::MemoryBackend;

/// Result of a single backend call.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

// == Score Order ==
/// Direction of a sorted map range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Lowest score first, ties oldest first
    Ascending,
    /// Highest score first, ties newest first
    Descending,
}

// == Scored Entry ==
/// A member of a sorted map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    pub key: String,
    pub score: f64,
}

impl ScoredEntry {
    pub fn new(key: impl Into<String>, score: f64) -> Self {
        Self {
            key: key.into(),
            score,
        }
    }
}

// == Backend Trait ==
/// Remote TTL key/value, sorted map and queue storage.
///
/// Every call may fail transiently; callers go through
/// [`RetryExecutor`](crate::retry::RetryExecutor).
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Writes a hash map entry that expires after `ttl`.
    async fn put(&self, container: &str, key: &str, value: Value, ttl: Duration)
        -> BackendResult<()>;

    /// Reads a hash map entry. Missing and expired entries are `None`.
    async fn get(&self, container: &str, key: &str) -> BackendResult<Option<Value>>;

    /// Writes a sorted map member and refreshes the container's TTL.
    async fn put_score(
        &self,
        container: &str,
        key: &str,
        score: f64,
        ttl: Duration,
    ) -> BackendResult<()>;

    /// Number of members in a sorted map.
    async fn sorted_size(&self, container: &str) -> BackendResult<usize>;

    /// Up to `limit` sorted map members in the given order.
    async fn range_by_score(
        &self,
        container: &str,
        order: ScoreOrder,
        limit: usize,
    ) -> BackendResult<Vec<ScoredEntry>>;

    /// Removes sorted map members, returning how many existed.
    async fn remove_scores(&self, container: &str, keys: &[String]) -> BackendResult<usize>;

    /// Appends to a queue and refreshes the queue's TTL.
    async fn enqueue(&self, container: &str, value: Value, ttl: Duration) -> BackendResult<()>;

    /// Pops the oldest queued value.
    async fn dequeue(&self, container: &str) -> BackendResult<Option<Value>>;

    /// Number of values in a queue.
    async fn queue_size(&self, container: &str) -> BackendResult<usize>;
}
