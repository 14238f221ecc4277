//! Error types for the store guard
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Backend Error Enum ==
/// Failure reported by a storage backend call.
///
/// Every variant is treated as transient: the retry executor retries all of
/// them up to the configured bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend could not be reached or refused the call
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected the call because of rate limiting
    #[error("Backend throttled the request")]
    Throttled,

    /// Backend call did not complete in time
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),
}

// == Error Class ==
/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any backend interaction, never retried
    InvalidInput,
    /// Single backend failure, retried by the executor
    BackendTransient,
    /// All retry attempts failed
    RetryExhausted,
    /// Cleanup registry mutation rejected
    Registry,
}

// == Store Error Enum ==
/// Unified error type for the store guard.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key was empty
    #[error("Invalid key for {operation} on container '{container}'")]
    InvalidKey {
        operation: &'static str,
        container: String,
    },

    /// Score was NaN or infinite
    #[error("Score for key '{key}' in '{container}' is not a finite number")]
    InvalidScore { container: String, key: String },

    /// Value could not be encoded for storage or decoded on read
    #[error("Invalid value for {operation} on container '{container}': {source}")]
    InvalidValue {
        operation: &'static str,
        container: String,
        #[source]
        source: serde_json::Error,
    },

    /// Cleanup interval below the one minute floor
    #[error("Invalid cleanup interval {0:?}: must be at least one minute")]
    InvalidInterval(Duration),

    /// Cleanup task name was empty
    #[error("Cleanup task name cannot be empty")]
    InvalidTaskName,

    /// Settings failed validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Single backend failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Backend kept failing for every allowed attempt
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// A cleanup task with this name is already registered
    #[error("Cleanup task already registered: {0}")]
    DuplicateTask(String),

    /// No cleanup task with this name is registered
    #[error("Cleanup task not found: {0}")]
    TaskNotFound(String),
}

impl StoreError {
    /// Returns the classification used for diagnostics and callers.
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::InvalidKey { .. }
            | StoreError::InvalidScore { .. }
            | StoreError::InvalidValue { .. }
            | StoreError::InvalidInterval(_)
            | StoreError::InvalidTaskName
            | StoreError::InvalidSettings(_) => ErrorClass::InvalidInput,
            StoreError::Backend(_) => ErrorClass::BackendTransient,
            StoreError::RetryExhausted { .. } => ErrorClass::RetryExhausted,
            StoreError::DuplicateTask(_) | StoreError::TaskNotFound(_) => ErrorClass::Registry,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the store guard.
pub type Result<T> = std::result::Result<T, StoreError>;
