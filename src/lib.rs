//! Store Guard - a reliability layer for remote TTL storage
//!
//! Wraps a rate-limited key/value, sorted map and queue backend with retries,
//! typed diagnostics and scheduled cleanup tasks.

pub mod backend;
pub mod config;
pub mod containers;
pub mod diagnostics;
pub mod error;
pub mod retry;
pub mod store;
pub mod tasks;

pub use backend::{Backend, MemoryBackend};
pub use config::Settings;
pub use diagnostics::{DiagnosticCategory, DiagnosticEvent, DiagnosticKind, DiagnosticsBus};
pub use error::{BackendError, StoreError};
pub use store::ResilientStore;
