//! Property-Based Tests for Retry Module
//!
//! Uses proptest to check attempt counting and the backoff schedule.

use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::diagnostics::{DiagnosticCategory, DiagnosticsBus};
use crate::error::BackendError;
use crate::retry::{RetryExecutor, RetryPolicy};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn counting_bus() -> (Arc<DiagnosticsBus>, Arc<Mutex<Vec<DiagnosticCategory>>>) {
    let bus = Arc::new(DiagnosticsBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event| sink.lock().unwrap().push(event.category));
    (bus, seen)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // An operation failing k < n times then succeeding is invoked exactly
    // k + 1 times and raises no error event.
    #[test]
    fn prop_recovers_after_k_failures(n in 1u32..8, k_seed in 0u32..8) {
        let k = k_seed % n;
        let (bus, seen) = counting_bus();
        let executor = RetryExecutor::new(RetryPolicy::new(n, Duration::from_millis(5)), false, bus);
        let calls = AtomicU32::new(0);

        let result = paused_runtime().block_on(executor.execute("Op", || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call <= k { Err(BackendError::Throttled) } else { Ok(call) }
            }
        }));

        prop_assert_eq!(result.unwrap(), k + 1);
        prop_assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        prop_assert!(seen.lock().unwrap().is_empty());
    }

    // An operation that always fails is invoked exactly n times, waits the
    // full backoff schedule and raises exactly one RetryFailed event.
    #[test]
    fn prop_exhaustion_invokes_n_times(n in 1u32..8, base_ms in 1u64..50) {
        let (bus, seen) = counting_bus();
        let policy = RetryPolicy::new(n, Duration::from_millis(base_ms));
        let executor = RetryExecutor::new(policy, false, bus);
        let calls = AtomicU32::new(0);

        let rt = paused_runtime();
        let elapsed = rt.block_on(async {
            let start = tokio::time::Instant::now();
            let result = executor
                .execute("Op", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(BackendError::Throttled) }
                })
                .await;
            assert!(result.is_err());
            tokio::time::Instant::now() - start
        });

        prop_assert_eq!(calls.load(Ordering::SeqCst), n);
        prop_assert_eq!(elapsed, policy.total_backoff());
        prop_assert_eq!(seen.lock().unwrap().clone(), vec![DiagnosticCategory::RetryFailed]);
    }

    #[test]
    fn prop_delay_is_base_times_power_of_two(attempt in 1u32..20, base_ms in 0u64..10_000) {
        let base = Duration::from_millis(base_ms);
        let policy = RetryPolicy::new(attempt, base);
        prop_assert_eq!(policy.delay_for(attempt), base * 2u32.pow(attempt - 1));
    }
}
