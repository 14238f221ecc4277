//! Retry Module
//!
//! Bounded retries with exponential backoff around every backend call.

mod executor;
mod policy;

#[cfg(test)]
mod property_tests;

pub use executor::{RetryExecutor, RetryOutcome};
pub use policy::RetryPolicy;
