//! Diagnostics Bus Module
//!
//! Synchronous, ordered fan-out of diagnostic events.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::config::Settings;
use crate::diagnostics::{DiagnosticCategory, DiagnosticEvent, DiagnosticKind};

type Handler = Arc<dyn Fn(&DiagnosticEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Handler),
    /// Pruned once the receiving end is dropped
    Channel(mpsc::UnboundedSender<DiagnosticEvent>),
}

/// Handle returned by [`DiagnosticsBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// == Diagnostics Bus ==
/// Publish/subscribe channel for Error and Warning events.
///
/// Subscribers run on the publisher's thread, in subscription order, before
/// `publish_*` returns. A panicking subscriber is skipped over and never
/// reaches the publisher.
pub struct DiagnosticsBus {
    subscribers: RwLock<Vec<(SubscriptionId, Sink)>>,
    next_id: AtomicU64,
    errors_enabled: bool,
    warnings_enabled: bool,
}

impl DiagnosticsBus {
    /// Creates a bus with both event kinds enabled.
    pub fn new() -> Self {
        Self::with_gates(true, true)
    }

    /// Creates a bus gated by the settings' error and warning switches.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_gates(settings.errors_enabled, settings.warnings_enabled)
    }

    fn with_gates(errors_enabled: bool, warnings_enabled: bool) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            errors_enabled,
            warnings_enabled,
        }
    }

    // == Subscribe ==
    /// Registers a handler that sees every published event from now on.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DiagnosticEvent) + Send + Sync + 'static,
    {
        self.add(Sink::Callback(Arc::new(handler)))
    }

    /// Subscribes through an unbounded channel, for async consumers.
    ///
    /// Dropping the receiver ends the subscription; it is removed on the next
    /// publish.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<DiagnosticEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add(Sink::Channel(tx));
        rx
    }

    fn add(&self, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, sink));
        id
    }

    // == Unsubscribe ==
    /// Removes a handler. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // == Publish ==
    /// Publishes an Error event, unless errors are disabled.
    pub fn publish_error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        if !self.errors_enabled {
            return;
        }
        let event = DiagnosticEvent::error(category, message);
        error!(category = %event.category, "{}", event.message);
        self.deliver(&event);
    }

    /// Publishes a Warning event, unless warnings are disabled.
    pub fn publish_warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        if !self.warnings_enabled {
            return;
        }
        let event = DiagnosticEvent::warning(category, message);
        warn!(category = %event.category, "{}", event.message);
        self.deliver(&event);
    }

    fn deliver(&self, event: &DiagnosticEvent) {
        // Snapshot so handlers may subscribe or publish without deadlocking.
        let sinks: Vec<(SubscriptionId, Sink)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut closed = Vec::new();
        for (id, sink) in sinks {
            match sink {
                Sink::Callback(handler) => {
                    if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                        let kind = match event.kind {
                            DiagnosticKind::Error => "error",
                            DiagnosticKind::Warning => "warning",
                        };
                        warn!(category = %event.category, "Diagnostics subscriber panicked on {} event", kind);
                    }
                }
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            self.subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| !closed.contains(id));
        }
    }
}

impl Default for DiagnosticsBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiagnosticsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsBus")
            .field("subscribers", &self.subscriber_count())
            .field("errors_enabled", &self.errors_enabled)
            .field("warnings_enabled", &self.warnings_enabled)
            .finish()
    }
}
