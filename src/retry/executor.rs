//! Retry Executor Module
//!
//! Runs a fallible backend call until it succeeds or the policy gives up.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::config::Settings;
use crate::diagnostics::{DiagnosticCategory, DiagnosticsBus};
use crate::error::{BackendError, Result, StoreError};
use crate::retry::RetryPolicy;

// == Retry Outcome ==
/// Result of one [`RetryExecutor::run`] call.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Value of the successful attempt, or the error of the last one
    pub result: std::result::Result<T, BackendError>,
}

impl<T> RetryOutcome<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn last_error(&self) -> Option<&BackendError> {
        self.result.as_ref().err()
    }
}

// == Retry Executor ==
/// Wraps backend calls with bounded attempts and exponential backoff.
///
/// Attempts within one call are strictly sequential. Backoff waits are tokio
/// timers, so concurrent calls each keep their own schedule, and dropping the
/// returned future abandons the call mid-wait.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    debug_enabled: bool,
    diagnostics: Arc<DiagnosticsBus>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, debug_enabled: bool, diagnostics: Arc<DiagnosticsBus>) -> Self {
        Self {
            policy,
            debug_enabled,
            diagnostics,
        }
    }

    pub fn from_settings(settings: &Settings, diagnostics: Arc<DiagnosticsBus>) -> Self {
        Self::new(
            RetryPolicy::from_settings(settings),
            settings.debug_enabled,
            diagnostics,
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    // == Run ==
    /// Runs `op` under the retry policy without publishing diagnostics.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    return RetryOutcome {
                        attempts: attempt,
                        result: Ok(value),
                    }
                }
                Err(error) => {
                    if self.debug_enabled {
                        debug!(attempt, operation, %error, "Backend call failed");
                    }
                    if attempt >= self.policy.attempts() {
                        return RetryOutcome {
                            attempts: attempt,
                            result: Err(error),
                        };
                    }
                    tokio::time::sleep(self.policy.delay_for(attempt)).await;
                }
            }
        }
    }

    // == Execute ==
    /// Runs `op` under the retry policy.
    ///
    /// On exhaustion publishes a `RetryFailed` error event and returns
    /// [`StoreError::RetryExhausted`]. The return value does not depend on
    /// whether error events are enabled.
    pub async fn execute<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendError>>,
    {
        let outcome = self.run(operation, op).await;
        match outcome.result {
            Ok(value) => Ok(value),
            Err(source) => {
                self.diagnostics.publish_error(
                    DiagnosticCategory::RetryFailed,
                    format!(
                        "{} failed after {} attempts: {}",
                        operation, outcome.attempts, source
                    ),
                );
                Err(StoreError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: outcome.attempts,
                    source,
                })
            }
        }
    }
}
