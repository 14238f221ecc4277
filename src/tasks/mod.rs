//! Background Tasks Module
//!
//! Cleanup callbacks registered by the caller and the scheduler that runs
//! them periodically. What a cleanup task does is entirely up to the caller.

mod registry;
mod scheduler;

pub use registry::{CleanupFuture, CleanupRegistry, CleanupReport, CleanupTask};
pub use scheduler::CleanupScheduler;
