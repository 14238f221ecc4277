//! Cleanup Registry Module
//!
//! Named maintenance callbacks and the "run all now" trigger.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::diagnostics::{DiagnosticCategory, DiagnosticsBus};
use crate::error::{Result, StoreError};

/// Future returned by a cleanup callback.
pub type CleanupFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type CleanupFn = Arc<dyn Fn() -> CleanupFuture + Send + Sync>;

// == Cleanup Task ==
/// A registered maintenance callback.
#[derive(Clone)]
pub struct CleanupTask {
    name: String,
    callback: CleanupFn,
}

impl CleanupTask {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CleanupTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupTask").field("name", &self.name).finish()
    }
}

// == Cleanup Report ==
/// Names of the tasks that succeeded and failed in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// == Cleanup Registry ==
/// Cleanup callbacks keyed by unique name, kept in registration order.
///
/// The lock is only held to mutate or snapshot the list, never while a
/// callback runs, so callbacks may register or unregister tasks.
pub struct CleanupRegistry {
    tasks: RwLock<Vec<CleanupTask>>,
    diagnostics: Arc<DiagnosticsBus>,
}

impl CleanupRegistry {
    pub fn new(diagnostics: Arc<DiagnosticsBus>) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            diagnostics,
        }
    }

    // == Register ==
    /// Adds a callback under `name`.
    ///
    /// Fails with [`StoreError::DuplicateTask`] if the name is taken and
    /// [`StoreError::InvalidTaskName`] if it is empty.
    pub fn register<F, Fut>(&self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::InvalidTaskName);
        }

        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if tasks.iter().any(|task| task.name == name) {
            return Err(StoreError::DuplicateTask(name));
        }

        debug!(task = %name, "Registered cleanup task");
        tasks.push(CleanupTask {
            name,
            callback: Arc::new(move || Box::pin(callback()) as CleanupFuture),
        });
        Ok(())
    }

    // == Unregister ==
    /// Removes the callback registered under `name`.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        match tasks.iter().position(|task| task.name == name) {
            Some(index) => {
                tasks.remove(index);
                debug!(task = name, "Unregistered cleanup task");
                Ok(())
            }
            None => Err(StoreError::TaskNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().iter().any(|task| task.name == name)
    }

    /// Registered names in registration order.
    pub fn task_names(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|task| task.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<CleanupTask> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // == Run All Now ==
    /// Runs every registered callback once, in registration order.
    ///
    /// Tasks registered while the cycle runs wait for the next cycle. A
    /// callback that errors or panics yields a `CleanupTaskFailed` warning
    /// and the remaining callbacks still run.
    pub async fn run_all_now(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for task in self.snapshot() {
            let callback = Arc::clone(&task.callback);
            // Spawned so a panicking callback surfaces as a JoinError.
            let outcome = tokio::spawn(async move { callback().await }).await;

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(format!("{:#}", error)),
                Err(join_error) if join_error.is_panic() => Some("callback panicked".to_string()),
                Err(join_error) => Some(join_error.to_string()),
            };

            match failure {
                None => report.succeeded.push(task.name),
                Some(reason) => {
                    self.diagnostics.publish_warning(
                        DiagnosticCategory::CleanupTaskFailed,
                        format!("Cleanup task '{}' failed: {}", task.name, reason),
                    );
                    report.failed.push(task.name);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("tasks", &self.task_names())
            .finish()
    }
}
