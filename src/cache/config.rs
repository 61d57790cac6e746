//! Cache configuration.
//!
//! Controls the page cache and its backend via the `[cache]` settings table.

use std::{num::NonZeroUsize, time::Duration};

// Default values for cache configuration
const DEFAULT_CAPACITY: usize = 512;
const DEFAULT_PAGE_TTL_SECS: u64 = 300;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 250;

/// Runtime cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store rendered pages through the cache.
    pub enabled: bool,
    /// Maximum entries held by the in-process backend.
    pub capacity: usize,
    /// Lifetime of rendered pages. Zero keeps them until the next flush.
    pub page_ttl: Duration,
    /// Upper bound on any single backend operation.
    pub operation_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            page_ttl: Duration::from_secs(DEFAULT_PAGE_TTL_SECS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            page_ttl: settings.page_ttl,
            operation_timeout: settings.operation_timeout,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
