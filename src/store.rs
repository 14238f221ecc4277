//! Resilient Store Module
//!
//! The top-level component wiring settings, diagnostics, retries, containers
//! and cleanup scheduling around one backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::backend::Backend;
use crate::config::Settings;
use crate::containers::ContainerFacade;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsBus, SubscriptionId};
use crate::error::Result;
use crate::retry::RetryExecutor;
use crate::tasks::{CleanupRegistry, CleanupReport, CleanupScheduler};

// == Resilient Store ==
/// One independently owned instance of the reliability layer.
///
/// Instances share nothing: each has its own settings, diagnostics bus,
/// cleanup registry and scheduler.
pub struct ResilientStore<B: Backend> {
    settings: Arc<Settings>,
    diagnostics: Arc<DiagnosticsBus>,
    retry: RetryExecutor,
    containers: ContainerFacade<B>,
    scheduler: CleanupScheduler,
}

impl<B: Backend> ResilientStore<B> {
    /// Validates `settings` and builds a store over `backend`.
    pub fn new(settings: Settings, backend: B) -> Result<Self> {
        Self::with_shared_backend(settings, Arc::new(backend))
    }

    /// Like [`new`](Self::new), for a backend the caller keeps a handle to.
    pub fn with_shared_backend(settings: Settings, backend: Arc<B>) -> Result<Self> {
        settings.validate()?;
        let settings = Arc::new(settings);
        let diagnostics = Arc::new(DiagnosticsBus::from_settings(&settings));
        let retry = RetryExecutor::from_settings(&settings, Arc::clone(&diagnostics));
        let containers = ContainerFacade::new(
            backend,
            Arc::clone(&settings),
            retry.clone(),
            Arc::clone(&diagnostics),
        );
        let registry = Arc::new(CleanupRegistry::new(Arc::clone(&diagnostics)));
        let scheduler = CleanupScheduler::new(registry, settings.cleanup_interval)?;

        info!(
            retry_attempts = settings.retry_attempts,
            max_sorted_entries = settings.max_sorted_entries,
            queue_max_size = settings.queue_max_size,
            "Resilient store initialized"
        );

        Ok(Self {
            settings,
            diagnostics,
            retry,
            containers,
            scheduler,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsBus> {
        &self.diagnostics
    }

    /// Executor for backend calls the facade does not cover.
    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Typed hash map, sorted map and queue operations.
    pub fn containers(&self) -> &ContainerFacade<B> {
        &self.containers
    }

    pub fn backend(&self) -> &Arc<B> {
        self.containers.backend()
    }

    pub fn scheduler(&self) -> &CleanupScheduler {
        &self.scheduler
    }

    // == Diagnostics ==
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DiagnosticEvent) + Send + Sync + 'static,
    {
        self.diagnostics.subscribe(handler)
    }

    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<DiagnosticEvent> {
        self.diagnostics.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.diagnostics.unsubscribe(id)
    }

    // == Cleanup ==
    pub fn register_cleanup<F, Fut>(&self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.scheduler.registry().register(name, callback)
    }

    pub fn unregister_cleanup(&self, name: &str) -> Result<()> {
        self.scheduler.registry().unregister(name)
    }

    pub async fn run_cleanup_now(&self) -> CleanupReport {
        self.scheduler.registry().run_all_now().await
    }

    pub fn set_cleanup_interval(&self, interval: Duration) -> Result<()> {
        self.scheduler.set_interval(interval)
    }

    pub fn start_cleanup(&self) {
        self.scheduler.start();
    }

    pub fn stop_cleanup(&self) {
        self.scheduler.stop();
    }
}
