//! Diagnostic Event Module
//!
//! Defines the immutable event delivered to bus subscribers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Diagnostic Kind ==
/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Error,
    Warning,
}

// == Diagnostic Category ==
/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCategory {
    /// A backend call failed on every allowed attempt
    RetryFailed,
    /// A hash map write could not be stored
    HashMapSetFail,
    /// A sorted map grew past its capacity and was trimmed
    SortedMapOverflow,
    /// A queue reached its soft size limit
    QueueFull,
    /// A registered cleanup callback failed
    CleanupTaskFailed,
}

impl DiagnosticCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCategory::RetryFailed => "RetryFailed",
            DiagnosticCategory::HashMapSetFail => "HashMapSetFail",
            DiagnosticCategory::SortedMapOverflow => "SortedMapOverflow",
            DiagnosticCategory::QueueFull => "QueueFull",
            DiagnosticCategory::CleanupTaskFailed => "CleanupTaskFailed",
        }
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Diagnostic Event ==
/// A single Error or Warning notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEvent {
    pub kind: DiagnosticKind,
    pub category: DiagnosticCategory,
    pub message: String,
    /// When the event was published
    pub at: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn error(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, category, message)
    }

    pub fn warning(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, category, message)
    }

    fn new(kind: DiagnosticKind, category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            kind,
            category,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}
