//! Cache backend contract.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failures reported by a cache backend.
///
/// These never reach HTTP callers; the page cache and snippet fetcher absorb them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation `{op}` timed out")]
    Timeout { op: &'static str },
    #[error("cache entry already present")]
    NotStored,
}

/// A shared key/value store for opaque byte payloads.
///
/// Implementations must be safe under unbounded concurrent access and must not
/// hold in-process locks across suspension points.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a live entry. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` unless a live entry already exists under `key`.
    ///
    /// A zero `ttl` keeps the entry until the next flush or eviction.
    async fn add(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Remove every entry.
    async fn flush_all(&self) -> Result<(), CacheError>;
}

/// Run a backend operation under a deadline, mapping expiry to [`CacheError::Timeout`].
pub async fn bounded<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout { op }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let value = bounded("get", Duration::from_secs(1), async { Ok::<_, CacheError>(7) })
            .await
            .expect("completes");
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_reports_timeout() {
        let result = bounded("get", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, CacheError>(())
        })
        .await;
        assert_eq!(result, Err(CacheError::Timeout { op: "get" }));
    }
}
