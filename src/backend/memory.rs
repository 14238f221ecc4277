//! Memory Backend Module
//!
//! In-process implementation of [`Backend`] used by tests and the demo binary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::backend::{Backend, BackendResult, ScoreOrder, ScoredEntry, StoredEntry};
use crate::error::BackendError;

#[derive(Debug, Clone, Copy)]
struct SortedMember {
    score: f64,
    /// Insertion sequence, breaks score ties
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    maps: HashMap<String, HashMap<String, StoredEntry<Value>>>,
    sorted: HashMap<String, StoredEntry<HashMap<String, SortedMember>>>,
    queues: HashMap<String, StoredEntry<VecDeque<Value>>>,
    next_seq: u64,
}

impl MemoryState {
    /// Live sorted map, dropping it first if its TTL elapsed.
    fn sorted_mut(&mut self, container: &str) -> Option<&mut StoredEntry<HashMap<String, SortedMember>>> {
        if self.sorted.get(container).is_some_and(|c| c.is_expired()) {
            self.sorted.remove(container);
        }
        self.sorted.get_mut(container)
    }

    /// Live queue, dropping it first if its TTL elapsed.
    fn queue_mut(&mut self, container: &str) -> Option<&mut StoredEntry<VecDeque<Value>>> {
        if self.queues.get(container).is_some_and(|q| q.is_expired()) {
            self.queues.remove(container);
        }
        self.queues.get_mut(container)
    }
}

// == Memory Backend ==
/// Hash maps, sorted maps and queues held in memory.
///
/// Expiry is lazy: expired entries and containers are dropped when next
/// touched. Hash map TTLs apply per entry, sorted map and queue TTLs apply to
/// the whole container and are refreshed on every write.
///
/// [`inject_failures`](Self::inject_failures) and
/// [`set_unavailable`](Self::set_unavailable) make calls fail with
/// [`BackendError::Unavailable`] before touching any state.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    pending_failures: AtomicU32,
    unavailable: AtomicBool,
    calls: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail.
    pub fn inject_failures(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of calls received, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn admit(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(BackendError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn put(
        &self,
        container: &str,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> BackendResult<()> {
        self.admit()?;
        let mut state = self.state.write().await;
        state
            .maps
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), StoredEntry::new(value, Some(ttl)));
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> BackendResult<Option<Value>> {
        self.admit()?;
        let mut state = self.state.write().await;
        let Some(map) = state.maps.get_mut(container) else {
            return Ok(None);
        };
        let expired = match map.get(key) {
            Some(entry) => entry.is_expired(),
            None => return Ok(None),
        };
        if expired {
            map.remove(key);
            return Ok(None);
        }
        Ok(map.get(key).map(|entry| entry.value.clone()))
    }

    async fn put_score(
        &self,
        container: &str,
        key: &str,
        score: f64,
        ttl: Duration,
    ) -> BackendResult<()> {
        self.admit()?;
        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;

        if state.sorted_mut(container).is_none() {
            state
                .sorted
                .insert(container.to_string(), StoredEntry::new(HashMap::new(), None));
        }
        if let Some(sorted) = state.sorted_mut(container) {
            sorted.refresh(ttl);
            sorted
                .value
                .entry(key.to_string())
                .and_modify(|member| member.score = score)
                .or_insert(SortedMember { score, seq });
        }
        Ok(())
    }

    async fn sorted_size(&self, container: &str) -> BackendResult<usize> {
        self.admit()?;
        let mut state = self.state.write().await;
        Ok(state.sorted_mut(container).map_or(0, |s| s.value.len()))
    }

    async fn range_by_score(
        &self,
        container: &str,
        order: ScoreOrder,
        limit: usize,
    ) -> BackendResult<Vec<ScoredEntry>> {
        self.admit()?;
        let mut state = self.state.write().await;
        let Some(sorted) = state.sorted_mut(container) else {
            return Ok(Vec::new());
        };

        let mut members: Vec<(&String, &SortedMember)> = sorted.value.iter().collect();
        members.sort_by(|(_, a), (_, b)| a.score.total_cmp(&b.score).then(a.seq.cmp(&b.seq)));
        if order == ScoreOrder::Descending {
            members.reverse();
        }

        Ok(members
            .into_iter()
            .take(limit)
            .map(|(key, member)| ScoredEntry::new(key.clone(), member.score))
            .collect())
    }

    async fn remove_scores(&self, container: &str, keys: &[String]) -> BackendResult<usize> {
        self.admit()?;
        let mut state = self.state.write().await;
        let Some(sorted) = state.sorted_mut(container) else {
            return Ok(0);
        };
        Ok(keys
            .iter()
            .filter(|key| sorted.value.remove(key.as_str()).is_some())
            .count())
    }

    async fn enqueue(&self, container: &str, value: Value, ttl: Duration) -> BackendResult<()> {
        self.admit()?;
        let mut state = self.state.write().await;
        if state.queue_mut(container).is_none() {
            state
                .queues
                .insert(container.to_string(), StoredEntry::new(VecDeque::new(), None));
        }
        if let Some(queue) = state.queue_mut(container) {
            queue.refresh(ttl);
            queue.value.push_back(value);
        }
        Ok(())
    }

    async fn dequeue(&self, container: &str) -> BackendResult<Option<Value>> {
        self.admit()?;
        let mut state = self.state.write().await;
        Ok(state
            .queue_mut(container)
            .and_then(|queue| queue.value.pop_front()))
    }

    async fn queue_size(&self, container: &str) -> BackendResult<usize> {
        self.admit()?;
        let mut state = self.state.write().await;
        Ok(state.queue_mut(container).map_or(0, |q| q.value.len()))
    }
}
