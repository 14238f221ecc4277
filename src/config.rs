//! Configuration Module
//!
//! Settings shared read-only by every component of a store instance.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Shortest cleanup interval the scheduler accepts.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Store settings.
///
/// Built once, validated, then frozen behind an `Arc` by
/// [`ResilientStore`](crate::ResilientStore).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// TTL applied when a write does not specify one
    pub default_expiry: Duration,
    /// Entry count a sorted map is trimmed back to
    pub max_sorted_entries: usize,
    /// Queue length at which enqueue starts warning
    pub queue_max_size: usize,
    /// Total attempts per backend call, including the first
    pub retry_attempts: u32,
    /// Wait after the first failed attempt; doubles on each further failure
    pub retry_base_delay: Duration,
    /// Initial wait between cleanup cycles
    pub cleanup_interval: Duration,
    /// Trace every failed attempt at debug level
    pub debug_enabled: bool,
    /// Publish warning diagnostics
    pub warnings_enabled: bool,
    /// Publish error diagnostics
    pub errors_enabled: bool,
}

impl Settings {
    /// Creates Settings by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_DEFAULT_EXPIRY_SECS` - Default TTL in seconds (default: 3600)
    /// - `STORE_MAX_SORTED_ENTRIES` - Sorted map capacity (default: 1000)
    /// - `STORE_QUEUE_MAX_SIZE` - Queue warning threshold (default: 10000)
    /// - `STORE_RETRY_ATTEMPTS` - Attempts per backend call (default: 3)
    /// - `STORE_RETRY_BASE_DELAY_MS` - First backoff in milliseconds (default: 500)
    /// - `STORE_CLEANUP_INTERVAL_SECS` - Cleanup frequency in seconds (default: 900)
    /// - `STORE_DEBUG`, `STORE_WARNINGS`, `STORE_ERRORS` - `true`/`false`
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_expiry: Duration::from_secs(env_or(
                "STORE_DEFAULT_EXPIRY_SECS",
                defaults.default_expiry.as_secs(),
            )),
            max_sorted_entries: env_or("STORE_MAX_SORTED_ENTRIES", defaults.max_sorted_entries),
            queue_max_size: env_or("STORE_QUEUE_MAX_SIZE", defaults.queue_max_size),
            retry_attempts: env_or("STORE_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_base_delay: Duration::from_millis(env_or(
                "STORE_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            cleanup_interval: Duration::from_secs(env_or(
                "STORE_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
            debug_enabled: env_or("STORE_DEBUG", defaults.debug_enabled),
            warnings_enabled: env_or("STORE_WARNINGS", defaults.warnings_enabled),
            errors_enabled: env_or("STORE_ERRORS", defaults.errors_enabled),
        }
    }

    /// Checks every bound the components rely on.
    pub fn validate(&self) -> Result<()> {
        if self.max_sorted_entries == 0 {
            return Err(StoreError::InvalidSettings(
                "max_sorted_entries must be at least 1".to_string(),
            ));
        }
        if self.queue_max_size == 0 {
            return Err(StoreError::InvalidSettings(
                "queue_max_size must be at least 1".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(StoreError::InvalidSettings(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.cleanup_interval < MIN_CLEANUP_INTERVAL {
            return Err(StoreError::InvalidInterval(self.cleanup_interval));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_expiry: Duration::from_secs(3600),
            max_sorted_entries: 1000,
            queue_max_size: 10_000,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            cleanup_interval: Duration::from_secs(900),
            debug_enabled: false,
            warnings_enabled: true,
            errors_enabled: true,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.default_expiry, Duration::from_secs(3600));
        assert_eq!(settings.max_sorted_entries, 1000);
        assert_eq!(settings.queue_max_size, 10_000);
        assert_eq!(settings.retry_attempts, 3);
        assert_eq!(settings.retry_base_delay, Duration::from_millis(500));
        assert!(settings.warnings_enabled);
        assert!(settings.errors_enabled);
        assert!(!settings.debug_enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_env() {
        env::set_var("STORE_RETRY_ATTEMPTS", "5");
        env::set_var("STORE_QUEUE_MAX_SIZE", "not-a-number");
        env::set_var("STORE_WARNINGS", "false");

        let settings = Settings::from_env();
        assert_eq!(settings.retry_attempts, 5);
        assert_eq!(settings.queue_max_size, 10_000);
        assert!(!settings.warnings_enabled);

        env::remove_var("STORE_RETRY_ATTEMPTS");
        env::remove_var("STORE_QUEUE_MAX_SIZE");
        env::remove_var("STORE_WARNINGS");
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let settings = Settings {
            retry_attempts: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(StoreError::InvalidSettings(_))
        ));

        let settings = Settings {
            max_sorted_entries: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(StoreError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_cleanup_interval() {
        let settings = Settings {
            cleanup_interval: Duration::from_secs(30),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(StoreError::InvalidInterval(_))
        ));
    }
}
