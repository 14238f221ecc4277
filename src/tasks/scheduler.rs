//! Cleanup Scheduler Module
//!
//! Background loop that periodically runs every registered cleanup task.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MIN_CLEANUP_INTERVAL;
use crate::error::{Result, StoreError};
use crate::tasks::CleanupRegistry;

#[derive(Debug)]
struct SchedulerState {
    running: bool,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

// == Cleanup Scheduler ==
/// Runs [`CleanupRegistry::run_all_now`] every `interval` while started.
///
/// State machine: `Idle -> Running -> Idle`. Starting while running and
/// stopping while idle are no-ops. Dropping the scheduler stops it.
///
/// At most one cycle runs at a time: a loop started after `stop` waits for
/// the previous loop's in-flight cycle before its first wait.
#[derive(Debug)]
pub struct CleanupScheduler {
    registry: Arc<CleanupRegistry>,
    interval: Arc<RwLock<Duration>>,
    state: Mutex<SchedulerState>,
}

impl CleanupScheduler {
    /// Creates an idle scheduler. Fails if `interval` is under one minute.
    pub fn new(registry: Arc<CleanupRegistry>, interval: Duration) -> Result<Self> {
        validate_interval(interval)?;
        Ok(Self {
            registry,
            interval: Arc::new(RwLock::new(interval)),
            state: Mutex::new(SchedulerState {
                running: false,
                cancel: CancellationToken::new(),
                handle: None,
            }),
        })
    }

    pub fn registry(&self) -> &Arc<CleanupRegistry> {
        &self.registry
    }

    pub fn interval(&self) -> Duration {
        *self.interval.read().unwrap_or_else(PoisonError::into_inner)
    }

    // == Set Interval ==
    /// Changes the wait between cycles.
    ///
    /// A wait already in progress keeps its original length; the new value
    /// applies from the next wait.
    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        validate_interval(interval)?;
        *self.interval.write().unwrap_or_else(PoisonError::into_inner) = interval;
        debug!(?interval, "Cleanup interval updated");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    // == Start ==
    /// Launches the background loop unless it is already running.
    ///
    /// Outside a tokio runtime this logs a warning and the scheduler stays
    /// idle.
    pub fn start(&self) {
        let mut state = self.lock_state();
        if state.running {
            debug!("Cleanup scheduler already running");
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(error) => {
                warn!(%error, "Cleanup scheduler needs a tokio runtime to start");
                return;
            }
        };

        let cancel = CancellationToken::new();
        let previous = state.handle.take();
        let handle = runtime.spawn(run_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.interval),
            cancel.clone(),
            previous,
        ));
        state.cancel = cancel;
        state.handle = Some(handle);
        state.running = true;
    }

    // == Stop ==
    /// Signals the loop to stop.
    ///
    /// A cycle already running finishes; no further cycle starts. Safe to call
    /// from any context, any number of times.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        if !state.running {
            return;
        }
        state.running = false;
        state.cancel.cancel();
        // The handle stays so the next start can wait for the in-flight cycle.
        info!("Cleanup scheduler stop requested");
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.lock_state().cancel.cancel();
    }
}

fn validate_interval(interval: Duration) -> Result<()> {
    if interval < MIN_CLEANUP_INTERVAL {
        return Err(StoreError::InvalidInterval(interval));
    }
    Ok(())
}

async fn run_loop(
    registry: Arc<CleanupRegistry>,
    interval: Arc<RwLock<Duration>>,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    // The previous loop is already cancelled; it only finishes its cycle.
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    info!("Cleanup scheduler started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let wait = *interval.read().unwrap_or_else(PoisonError::into_inner);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        if cancel.is_cancelled() {
            break;
        }

        let report = registry.run_all_now().await;
        if report.is_clean() {
            debug!(tasks = report.total(), "Cleanup cycle finished");
        } else {
            warn!(
                tasks = report.total(),
                failed = report.failed.len(),
                "Cleanup cycle finished with failures"
            );
        }
    }

    info!("Cleanup scheduler stopped");
}
