//! Diagnostics Module
//!
//! Typed Error/Warning events and the bus that fans them out to subscribers.

mod bus;
mod event;

pub use bus::{DiagnosticsBus, SubscriptionId};
pub use event::{DiagnosticCategory, DiagnosticEvent, DiagnosticKind};
