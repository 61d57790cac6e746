//! In-process cache backend.
//!
//! An LRU map with per-entry expiry and memcache-style `add` semantics. It is
//! the default backend and the one exercised by tests; deployments that share a
//! cache across processes plug in another [`CacheBackend`].

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;

use super::backend::{CacheBackend, CacheError};
use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

struct StoredValue {
    body: Bytes,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// LRU-bounded, TTL-aware cache held in process memory.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, StoredValue>>,
}

impl MemoryCache {
    /// Create a new store sized by the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of entries currently held, including ones that expired but were not yet read.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.body.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn add(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "add");
        if entries.peek(key).is_some_and(|stored| stored.is_live(now)) {
            return Err(CacheError::NotStored);
        }

        let expires_at = (!ttl.is_zero()).then(|| now + ttl);
        entries.put(
            key.to_string(),
            StoredValue {
                body: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "flush_all").clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn store() -> MemoryCache {
        MemoryCache::new(&CacheConfig::default())
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let cache = store();
        assert_eq!(cache.get("k").await, Ok(None));

        cache
            .add("k", Bytes::from_static(b"hello"), Duration::from_secs(60))
            .await
            .expect("stored");

        assert_eq!(
            cache.get("k").await,
            Ok(Some(Bytes::from_static(b"hello")))
        );
    }

    #[tokio::test]
    async fn add_refuses_to_overwrite_live_entry() {
        let cache = store();
        cache
            .add("k", Bytes::from_static(b"first"), Duration::ZERO)
            .await
            .expect("stored");

        let second = cache
            .add("k", Bytes::from_static(b"second"), Duration::ZERO)
            .await;
        assert_eq!(second, Err(CacheError::NotStored));
        assert_eq!(
            cache.get("k").await,
            Ok(Some(Bytes::from_static(b"first")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = store();
        cache
            .add("k", Bytes::from_static(b"v"), Duration::from_secs(10))
            .await
            .expect("stored");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("k").await.expect("get").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await, Ok(None));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_never_expires() {
        let cache = store();
        cache
            .add("feed", Bytes::from_static(b"atom"), Duration::ZERO)
            .await
            .expect("stored");

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert!(cache.get("feed").await.expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_can_be_replaced() {
        let cache = store();
        cache
            .add("k", Bytes::from_static(b"old"), Duration::from_secs(1))
            .await
            .expect("stored");
        tokio::time::advance(Duration::from_secs(2)).await;

        cache
            .add("k", Bytes::from_static(b"new"), Duration::from_secs(1))
            .await
            .expect("expired entry replaced");
        assert_eq!(cache.get("k").await, Ok(Some(Bytes::from_static(b"new"))));
    }

    #[tokio::test]
    async fn flush_all_clears_everything() {
        let cache = store();
        for key in ["a", "b", "c"] {
            cache
                .add(key, Bytes::from_static(b"v"), Duration::ZERO)
                .await
                .expect("stored");
        }
        assert_eq!(cache.len(), 3);

        cache.flush_all().await.expect("flushed");
        assert!(cache.is_empty());
        assert_eq!(cache.get("a").await, Ok(None));
    }

    #[tokio::test]
    async fn lru_eviction_respects_capacity() {
        let cache = MemoryCache::new(&CacheConfig {
            capacity: 2,
            ..Default::default()
        });
        for key in ["a", "b", "c"] {
            cache
                .add(key, Bytes::from_static(b"v"), Duration::ZERO)
                .await
                .expect("stored");
        }

        assert_eq!(cache.get("a").await, Ok(None));
        assert!(cache.get("b").await.expect("get").is_some());
        assert!(cache.get("c").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let cache = store();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .entries
                .lock()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache
            .add("k", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .expect("stored after poison");
        assert!(cache.get("k").await.expect("get").is_some());
    }
}
