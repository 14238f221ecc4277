//! Stored Entry Module
//!
//! A value with an optional expiry deadline.

use std::time::Duration;

use tokio::time::Instant;

// == Stored Entry ==
/// A stored value and its expiry metadata.
///
/// Uses the tokio clock so paused-time tests control expiry.
#[derive(Debug, Clone)]
pub struct StoredEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was first stored
    pub created_at: Instant,
    /// Expiration deadline, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> StoredEntry<V> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` from now, or never if `None`.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches the deadline.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Instant::now() >= expires,
            None => false,
        }
    }

    /// Moves the deadline to `ttl` from now.
    pub fn refresh(&mut self, ttl: Duration) {
        self.expires_at = Some(Instant::now() + ttl);
    }

    /// Remaining time to live; `Some(ZERO)` once expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}
