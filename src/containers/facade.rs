//! Container Facade Module
//!
//! Validates inputs, routes every backend call through the retry executor and
//! enforces the soft capacity limits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::backend::{Backend, ScoreOrder, ScoredEntry};
use crate::config::Settings;
use crate::containers::{
    OP_DEQUEUE, OP_ENQUEUE, OP_GET_HASH_MAP, OP_QUEUE_LENGTH, OP_RANGE_SORTED_MAP,
    OP_SET_HASH_MAP, OP_SET_SORTED_MAP, OP_SORTED_MAP_SIZE, OP_TRIM_SORTED_MAP,
};
use crate::diagnostics::{DiagnosticCategory, DiagnosticsBus};
use crate::error::{Result, StoreError};
use crate::retry::RetryExecutor;

// == Container Facade ==
/// Typed operations on named backend containers.
///
/// Validation failures return before any backend call. Backend failures are
/// retried; only exhaustion reaches the caller.
///
/// Sorted map trimming is serialized per container, so concurrent writers
/// never trim a map below `max_sorted_entries`.
pub struct ContainerFacade<B: Backend> {
    backend: Arc<B>,
    settings: Arc<Settings>,
    retry: RetryExecutor,
    diagnostics: Arc<DiagnosticsBus>,
    trim_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<B: Backend> ContainerFacade<B> {
    pub fn new(
        backend: Arc<B>,
        settings: Arc<Settings>,
        retry: RetryExecutor,
        diagnostics: Arc<DiagnosticsBus>,
    ) -> Self {
        Self {
            backend,
            settings,
            retry,
            diagnostics,
            trim_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    // == Hash Map ==
    /// Stores `value` under `key`, expiring after `ttl` or the default expiry.
    ///
    /// On retry exhaustion a `HashMapSetFail` warning follows the executor's
    /// `RetryFailed` error.
    pub async fn set_value<T>(
        &self,
        container: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        validate_key(OP_SET_HASH_MAP, container, key)?;
        let value = encode(OP_SET_HASH_MAP, container, value)?;
        let ttl = self.ttl_or_default(ttl);

        let result = self
            .retry
            .execute(OP_SET_HASH_MAP, || {
                self.backend.put(container, key, value.clone(), ttl)
            })
            .await;

        if result.is_err() {
            self.diagnostics.publish_warning(
                DiagnosticCategory::HashMapSetFail,
                format!("Failed to set key '{}' in hash map '{}'", key, container),
            );
        }
        result
    }

    /// Reads `key`. `Ok(None)` means missing or expired.
    pub async fn get_value<T>(&self, container: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        validate_key(OP_GET_HASH_MAP, container, key)?;

        let stored = self
            .retry
            .execute(OP_GET_HASH_MAP, || self.backend.get(container, key))
            .await?;

        stored
            .map(|value| decode(OP_GET_HASH_MAP, container, value))
            .transpose()
    }

    // == Sorted Map ==
    /// Writes a score, then trims the container if it grew past capacity.
    ///
    /// Trimming removes the lowest scores first, oldest first among equal
    /// scores, and announces itself with a `SortedMapOverflow` warning. A
    /// trimming failure does not fail the write.
    pub async fn set_score(
        &self,
        container: &str,
        key: &str,
        score: f64,
        ttl: Option<Duration>,
    ) -> Result<()> {
        validate_key(OP_SET_SORTED_MAP, container, key)?;
        if !score.is_finite() {
            return Err(StoreError::InvalidScore {
                container: container.to_string(),
                key: key.to_string(),
            });
        }
        let ttl = self.ttl_or_default(ttl);

        self.retry
            .execute(OP_SET_SORTED_MAP, || {
                self.backend.put_score(container, key, score, ttl)
            })
            .await?;

        self.enforce_sorted_capacity(container).await;
        Ok(())
    }

    /// Number of members in a sorted map.
    pub async fn sorted_size(&self, container: &str) -> Result<usize> {
        validate_container(OP_SORTED_MAP_SIZE, container)?;
        self.retry
            .execute(OP_SORTED_MAP_SIZE, || self.backend.sorted_size(container))
            .await
    }

    /// Up to `limit` members, highest score first.
    pub async fn top_scores(&self, container: &str, limit: usize) -> Result<Vec<ScoredEntry>> {
        validate_container(OP_RANGE_SORTED_MAP, container)?;
        self.retry
            .execute(OP_RANGE_SORTED_MAP, || {
                self.backend
                    .range_by_score(container, ScoreOrder::Descending, limit)
            })
            .await
    }

    fn trim_lock(&self, container: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.trim_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(container.to_string()).or_default())
    }

    async fn enforce_sorted_capacity(&self, container: &str) {
        let max = self.settings.max_sorted_entries;
        // Size, range and remove must observe each other's effects.
        let lock = self.trim_lock(container);
        let _guard = lock.lock().await;

        // Failures below already raised RetryFailed; the next write retries the trim.
        let Ok(count) = self.sorted_size(container).await else {
            return;
        };
        if count <= max {
            return;
        }

        self.diagnostics.publish_warning(
            DiagnosticCategory::SortedMapOverflow,
            format!(
                "Sorted map '{}' holds {} entries, trimming to {}",
                container, count, max
            ),
        );

        let excess = count - max;
        let Ok(lowest) = self
            .retry
            .execute(OP_RANGE_SORTED_MAP, || {
                self.backend
                    .range_by_score(container, ScoreOrder::Ascending, excess)
            })
            .await
        else {
            return;
        };

        let keys: Vec<String> = lowest.into_iter().map(|entry| entry.key).collect();
        if let Ok(removed) = self
            .retry
            .execute(OP_TRIM_SORTED_MAP, || {
                self.backend.remove_scores(container, &keys)
            })
            .await
        {
            info!(container, removed, "Trimmed sorted map");
        }
    }

    // == Queue ==
    /// Appends `value` to a queue.
    ///
    /// A queue at or over `queue_max_size` raises a `QueueFull` warning, but
    /// the value is still written.
    pub async fn enqueue<T>(&self, container: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        validate_container(OP_ENQUEUE, container)?;
        let value = encode(OP_ENQUEUE, container, value)?;
        let ttl = self.ttl_or_default(ttl);

        let length = self.queue_length(container).await;
        let max = self.settings.queue_max_size;
        if length >= max {
            self.diagnostics.publish_warning(
                DiagnosticCategory::QueueFull,
                format!(
                    "Queue '{}' is full ({}/{}), value still enqueued",
                    container, length, max
                ),
            );
        }

        self.retry
            .execute(OP_ENQUEUE, || {
                self.backend.enqueue(container, value.clone(), ttl)
            })
            .await
    }

    /// Pops the oldest value of a queue.
    pub async fn dequeue<T>(&self, container: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        validate_container(OP_DEQUEUE, container)?;
        let stored = self
            .retry
            .execute(OP_DEQUEUE, || self.backend.dequeue(container))
            .await?;
        stored
            .map(|value| decode(OP_DEQUEUE, container, value))
            .transpose()
    }

    /// Current queue length.
    ///
    /// Advisory: returns 0 when the backend keeps failing (the executor still
    /// publishes `RetryFailed`) or when the container name is empty.
    pub async fn queue_length(&self, container: &str) -> usize {
        if container.is_empty() {
            return 0;
        }
        match self
            .retry
            .execute(OP_QUEUE_LENGTH, || self.backend.queue_size(container))
            .await
        {
            Ok(length) => length,
            Err(error) => {
                debug!(container, %error, "Queue length unavailable, reporting 0");
                0
            }
        }
    }

    fn ttl_or_default(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.settings.default_expiry)
    }
}

// == Validation ==
fn validate_key(operation: &'static str, container: &str, key: &str) -> Result<()> {
    validate_container(operation, container)?;
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            operation,
            container: container.to_string(),
        });
    }
    Ok(())
}

fn validate_container(operation: &'static str, container: &str) -> Result<()> {
    if container.is_empty() {
        return Err(StoreError::InvalidKey {
            operation,
            container: String::new(),
        });
    }
    Ok(())
}

fn encode<T: Serialize + ?Sized>(
    operation: &'static str,
    container: &str,
    value: &T,
) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| StoreError::InvalidValue {
        operation,
        container: container.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(operation: &'static str, container: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| StoreError::InvalidValue {
        operation,
        container: container.to_string(),
        source,
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde::Deserialize;
    use tokio_test::{assert_err, assert_ok};

    use crate::backend::MemoryBackend;
    use crate::diagnostics::{DiagnosticEvent, DiagnosticKind};
    use crate::error::ErrorClass;

    struct Harness {
        facade: ContainerFacade<MemoryBackend>,
        backend: Arc<MemoryBackend>,
        events: Arc<Mutex<Vec<DiagnosticEvent>>>,
    }

    impl Harness {
        fn new(settings: Settings) -> Self {
            let settings = Arc::new(settings);
            let bus = Arc::new(DiagnosticsBus::from_settings(&settings));
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

            let backend = Arc::new(MemoryBackend::new());
            let retry = RetryExecutor::from_settings(&settings, Arc::clone(&bus));
            let facade = ContainerFacade::new(Arc::clone(&backend), settings, retry, bus);
            Self {
                facade,
                backend,
                events,
            }
        }

        fn categories(&self) -> Vec<(DiagnosticKind, DiagnosticCategory)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| (e.kind, e.category))
                .collect()
        }
    }

    fn settings() -> Settings {
        Settings {
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(10),
            max_sorted_entries: 3,
            queue_max_size: 2,
            ..Settings::default()
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        level: u32,
    }

    #[tokio::test]
    async fn test_set_and_get_value() {
        let h = Harness::new(settings());
        let profile = Profile {
            name: "ada".to_string(),
            level: 7,
        };

        assert_ok!(h.facade.set_value("profiles", "u1", &profile, None).await);
        let read: Option<Profile> = h.facade.get_value("profiles", "u1").await.unwrap();

        assert_eq!(read, Some(profile));
        assert!(h.categories().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_none_not_error() {
        let h = Harness::new(settings());
        let read: Option<String> = h.facade.get_value("profiles", "ghost").await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_expired_is_none() {
        let h = Harness::new(settings());
        h.facade
            .set_value("sessions", "s1", "token", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let read: Option<String> = h.facade.get_value("sessions", "s1").await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn test_empty_key_fails_before_backend() {
        let h = Harness::new(settings());

        let result = h.facade.set_value("profiles", "", &1, None).await;
        match result {
            Err(StoreError::InvalidKey {
                operation,
                container,
            }) => {
                assert_eq!(operation, OP_SET_HASH_MAP);
                assert_eq!(container, "profiles");
            }
            other => panic!("expected InvalidKey, got {other:?}"),
        }

        let read = h.facade.get_value::<String>("profiles", "").await;
        assert!(matches!(read, Err(StoreError::InvalidKey { .. })));
        let score = h.facade.set_score("board", "", 1.0, None).await;
        assert!(matches!(score, Err(StoreError::InvalidKey { .. })));

        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_value_exhaustion_emits_error_then_warning() {
        let h = Harness::new(settings());
        h.backend.set_unavailable(true);

        let result = h.facade.set_value("profiles", "u1", &1, None).await;

        let error = assert_err!(result);
        assert_eq!(error.class(), ErrorClass::RetryExhausted);
        assert_eq!(h.backend.call_count(), 3);
        assert_eq!(
            h.categories(),
            vec![
                (DiagnosticKind::Error, DiagnosticCategory::RetryFailed),
                (DiagnosticKind::Warning, DiagnosticCategory::HashMapSetFail),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_exhaustion_is_distinct_from_absent() {
        let h = Harness::new(settings());
        h.backend.set_unavailable(true);

        let result = h.facade.get_value::<String>("profiles", "u1").await;

        assert!(matches!(result, Err(StoreError::RetryExhausted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_transparently() {
        let h = Harness::new(settings());
        h.backend.inject_failures(2);

        assert_ok!(h.facade.set_value("profiles", "u1", "x", None).await);
        assert!(h.categories().is_empty());
    }

    #[tokio::test]
    async fn test_get_value_wrong_type() {
        let h = Harness::new(settings());
        h.facade.set_value("profiles", "u1", "text", None).await.unwrap();

        let result = h.facade.get_value::<Profile>("profiles", "u1").await;
        assert!(matches!(result, Err(StoreError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_non_finite_score_rejected() {
        let h = Harness::new(settings());

        for score in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = h.facade.set_score("board", "k", score, None).await;
            assert!(matches!(result, Err(StoreError::InvalidScore { .. })));
        }
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sorted_map_trimmed_to_capacity() {
        let h = Harness::new(settings());

        h.facade.set_score("board", "a", 5.0, None).await.unwrap();
        h.facade.set_score("board", "b", 1.0, None).await.unwrap();
        h.facade.set_score("board", "c", 1.0, None).await.unwrap();
        assert!(h.categories().is_empty());

        h.facade.set_score("board", "d", 3.0, None).await.unwrap();

        assert_eq!(h.facade.sorted_size("board").await.unwrap(), 3);
        let top: HashMap<String, f64> = h
            .facade
            .top_scores("board", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.key, e.score))
            .collect();
        assert!(!top.contains_key("b"), "oldest lowest score is trimmed first");
        assert!(top.contains_key("c"));
        assert_eq!(
            h.categories(),
            vec![(DiagnosticKind::Warning, DiagnosticCategory::SortedMapOverflow)]
        );
    }

    #[tokio::test]
    async fn test_top_scores_descending() {
        let h = Harness::new(settings());
        h.facade.set_score("board", "a", 1.0, None).await.unwrap();
        h.facade.set_score("board", "b", 3.0, None).await.unwrap();
        h.facade.set_score("board", "c", 2.0, None).await.unwrap();

        let top = h.facade.top_scores("board", 2).await.unwrap();
        assert_eq!(
            top,
            vec![ScoredEntry::new("b", 3.0), ScoredEntry::new("c", 2.0)]
        );
    }

    #[tokio::test]
    async fn test_enqueue_over_limit_warns_and_stores() {
        let h = Harness::new(settings());

        h.facade.enqueue("jobs", &1, None).await.unwrap();
        h.facade.enqueue("jobs", &2, None).await.unwrap();
        assert!(h.categories().is_empty());

        h.facade.enqueue("jobs", &3, None).await.unwrap();
        h.facade.enqueue("jobs", &4, None).await.unwrap();

        assert_eq!(h.facade.queue_length("jobs").await, 4);
        assert_eq!(
            h.categories(),
            vec![
                (DiagnosticKind::Warning, DiagnosticCategory::QueueFull),
                (DiagnosticKind::Warning, DiagnosticCategory::QueueFull),
            ]
        );
        let first: Option<i32> = h.facade.dequeue("jobs").await.unwrap();
        assert_eq!(first, Some(1));
    }

    #[tokio::test]
    async fn test_queue_full_warning_carries_sizes() {
        let h = Harness::new(settings());
        for i in 0..3 {
            h.facade.enqueue("jobs", &i, None).await.unwrap();
        }

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("'jobs'"));
        assert!(events[0].message.contains("2/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_length_returns_zero_on_exhaustion() {
        let h = Harness::new(settings());
        h.backend.set_unavailable(true);

        assert_eq!(h.facade.queue_length("jobs").await, 0);
        assert_eq!(
            h.categories(),
            vec![(DiagnosticKind::Error, DiagnosticCategory::RetryFailed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_warnings_do_not_change_results() {
        let h = Harness::new(Settings {
            warnings_enabled: false,
            ..settings()
        });
        for i in 0..4 {
            assert_ok!(h.facade.enqueue("jobs", &i, None).await);
        }
        h.backend.set_unavailable(true);
        let result = h.facade.set_value("profiles", "u1", &1, None).await;

        assert!(matches!(result, Err(StoreError::RetryExhausted { .. })));
        assert_eq!(
            h.categories(),
            vec![(DiagnosticKind::Error, DiagnosticCategory::RetryFailed)]
        );
    }

    #[tokio::test]
    async fn test_default_expiry_applied() {
        let h = Harness::new(Settings {
            default_expiry: Duration::ZERO,
            ..settings()
        });
        h.facade.set_value("profiles", "u1", &1, None).await.unwrap();

        let read: Option<i32> = h.facade.get_value("profiles", "u1").await.unwrap();
        assert_eq!(read, None);
    }
}
