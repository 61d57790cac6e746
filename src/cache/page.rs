//! Read-through page cache.
//!
//! Wraps the rendering pipeline: a request is served from the backend when a
//! live rendering exists under its versioned key, and rendered then stored
//! otherwise. Backend failures are logged and treated as misses.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use super::{
    CacheConfig,
    backend::{CacheBackend, CacheError, bounded},
    keys::CacheKey,
};

pub const METRIC_PAGE_CACHE_HIT_TOTAL: &str = "verbalize_page_cache_hit_total";
pub const METRIC_PAGE_CACHE_MISS_TOTAL: &str = "verbalize_page_cache_miss_total";
pub const METRIC_PAGE_CACHE_ERROR_TOTAL: &str = "verbalize_page_cache_error_total";
pub const METRIC_CACHE_FLUSH_TOTAL: &str = "verbalize_cache_flush_total";

/// Outcome of a single cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(Bytes),
    Miss,
    Error(CacheError),
}

/// Versioned, TTL-bounded cache of rendered pages.
#[derive(Clone)]
pub struct PageCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    version: Arc<str>,
    /// Bumped by every flush. A render that straddles a flush is not stored.
    generation: Arc<AtomicU64>,
}

impl PageCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig, version: &str) -> Self {
        Self {
            backend,
            config,
            version: Arc::from(version),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deployment identifier every page key is namespaced by.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Default lifetime for rendered pages.
    pub fn page_ttl(&self) -> Duration {
        self.config.page_ttl
    }

    pub fn key_for(&self, origin: &str, path: &str) -> CacheKey {
        CacheKey::page(origin, path, &self.version)
    }

    /// Read the rendering stored for `path` on `origin`, classifying the outcome.
    pub async fn lookup(&self, origin: &str, path: &str) -> Lookup {
        let key = self.key_for(origin, path).encode();
        let outcome = bounded(
            "get",
            self.config.operation_timeout,
            self.backend.get(&key),
        )
        .await;

        match outcome {
            Ok(Some(body)) => {
                counter!(METRIC_PAGE_CACHE_HIT_TOTAL).increment(1);
                debug!(cache = "page", outcome = "hit", key = %key, "serving cached page");
                Lookup::Hit(body)
            }
            Ok(None) => {
                counter!(METRIC_PAGE_CACHE_MISS_TOTAL).increment(1);
                debug!(cache = "page", outcome = "miss", key = %key, "page not cached");
                Lookup::Miss
            }
            Err(err) => {
                counter!(METRIC_PAGE_CACHE_ERROR_TOTAL).increment(1);
                warn!(
                    cache = "page",
                    outcome = "error",
                    key = %key,
                    error = %err,
                    "page cache read failed; rendering instead"
                );
                Lookup::Error(err)
            }
        }
    }

    /// Store a rendering. Failures, including an already-present entry, are logged and dropped.
    pub async fn store(&self, origin: &str, path: &str, body: Bytes, ttl: Duration) {
        let key = self.key_for(origin, path).encode();
        let outcome = bounded(
            "add",
            self.config.operation_timeout,
            self.backend.add(&key, body, ttl),
        )
        .await;

        match outcome {
            Ok(()) => {
                debug!(cache = "page", key = %key, ttl_secs = ttl.as_secs(), "page stored");
            }
            Err(CacheError::NotStored) => {
                debug!(cache = "page", key = %key, "page already stored by a concurrent render");
            }
            Err(err) => {
                warn!(cache = "page", key = %key, error = %err, "page cache write failed");
            }
        }
    }

    /// Serve `path` on `origin` from the cache, or render and store it.
    ///
    /// A zero `ttl` keeps the rendering until the next flush. A failed render is
    /// returned untouched and never stored, and so is one that overlapped a flush.
    pub async fn get_or_render<F, Fut, E>(
        &self,
        origin: &str,
        path: &str,
        ttl: Duration,
        render: F,
    ) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if !self.config.enabled {
            return render().await;
        }

        let generation = self.generation.load(Ordering::Acquire);
        if let Lookup::Hit(body) = self.lookup(origin, path).await {
            return Ok(body);
        }

        let body = render().await?;
        if self.generation.load(Ordering::Acquire) == generation {
            self.store(origin, path, body.clone(), ttl).await;
        } else {
            debug!(cache = "page", path, "cache flushed during render; not storing");
        }
        Ok(body)
    }

    /// Drop every cached entry. Called after each successful content write.
    pub async fn flush(&self) {
        counter!(METRIC_CACHE_FLUSH_TOTAL).increment(1);
        self.generation.fetch_add(1, Ordering::AcqRel);
        match bounded(
            "flush_all",
            self.config.operation_timeout,
            self.backend.flush_all(),
        )
        .await
        {
            Ok(()) => debug!(cache = "page", "cache flushed"),
            Err(err) => warn!(cache = "page", error = %err, "cache flush failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCache;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn add(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    struct StalledBackend;

    #[async_trait]
    impl CacheBackend for StalledBackend {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn add(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    fn memory_cache(config: CacheConfig) -> PageCache {
        let backend = Arc::new(MemoryCache::new(&config));
        PageCache::new(backend, config, "v1")
    }

    const ORIGIN: &str = "http://example.com";

    async fn render_counting(
        cache: &PageCache,
        path: &str,
        calls: &AtomicUsize,
    ) -> Result<Bytes, String> {
        cache
            .get_or_render(ORIGIN, path, Duration::from_secs(60), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(Bytes::from(format!("render #{n}")))
            })
            .await
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = memory_cache(CacheConfig::default());
        let calls = AtomicUsize::new(0);

        let first = render_counting(&cache, "/", &calls).await.expect("render");
        let second = render_counting(&cache, "/", &calls).await.expect("cached");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_forces_rerender() {
        let cache = memory_cache(CacheConfig::default());
        let calls = AtomicUsize::new(0);

        let before = render_counting(&cache, "/feed/", &calls).await.expect("render");
        cache.flush().await;
        let after = render_counting(&cache, "/feed/", &calls).await.expect("render");

        assert_ne!(before, after);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_render_is_not_cached() {
        let cache = memory_cache(CacheConfig::default());

        let missing = cache
            .get_or_render(ORIGIN, "/nope", Duration::ZERO, || async {
                Err::<Bytes, _>("not found")
            })
            .await;
        assert_eq!(missing, Err("not found"));
        assert_eq!(cache.lookup(ORIGIN, "/nope").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_render() {
        let cache = PageCache::new(Arc::new(BrokenBackend), CacheConfig::default(), "v1");
        let calls = AtomicUsize::new(0);

        assert!(matches!(cache.lookup(ORIGIN, "/").await, Lookup::Error(_)));
        render_counting(&cache, "/", &calls).await.expect("render");
        render_counting(&cache, "/", &calls).await.expect("render");
        cache.flush().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out_into_render() {
        let cache = PageCache::new(Arc::new(StalledBackend), CacheConfig::default(), "v1");

        let lookup = cache.lookup(ORIGIN, "/").await;
        assert_eq!(lookup, Lookup::Error(CacheError::Timeout { op: "get" }));

        let body = cache
            .get_or_render(ORIGIN, "/", Duration::ZERO, || async {
                Ok::<_, String>(Bytes::from_static(b"fresh"))
            })
            .await
            .expect("render");
        assert_eq!(body, Bytes::from_static(b"fresh"));
    }

    #[tokio::test]
    async fn disabled_cache_always_renders() {
        let cache = memory_cache(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let calls = AtomicUsize::new(0);

        render_counting(&cache, "/", &calls).await.expect("render");
        render_counting(&cache, "/", &calls).await.expect("render");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.lookup(ORIGIN, "/").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn new_version_does_not_see_old_renderings() {
        let config = CacheConfig::default();
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new(&config));
        let old = PageCache::new(backend.clone(), config.clone(), "2024.1");
        let new = PageCache::new(backend, config, "2024.2");

        old.store(ORIGIN, "/", Bytes::from_static(b"old"), Duration::ZERO).await;

        assert_eq!(old.lookup(ORIGIN, "/").await, Lookup::Hit(Bytes::from_static(b"old")));
        assert_eq!(new.lookup(ORIGIN, "/").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn duplicate_store_keeps_first_rendering() {
        let cache = memory_cache(CacheConfig::default());

        cache.store(ORIGIN, "/a", Bytes::from_static(b"one"), Duration::ZERO).await;
        cache.store(ORIGIN, "/a", Bytes::from_static(b"two"), Duration::ZERO).await;

        assert_eq!(cache.lookup(ORIGIN, "/a").await, Lookup::Hit(Bytes::from_static(b"one")));
    }

    #[tokio::test]
    async fn origins_do_not_share_renderings() {
        let cache = memory_cache(CacheConfig::default());

        cache
            .store("http://evil.example", "/", Bytes::from_static(b"evil"), Duration::ZERO)
            .await;

        assert_eq!(cache.lookup("http://blog.example", "/").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn render_overlapping_a_flush_is_not_stored() {
        let cache = memory_cache(CacheConfig::default());

        let body = cache
            .get_or_render(ORIGIN, "/feed/", Duration::ZERO, || async {
                cache.flush().await;
                Ok::<_, String>(Bytes::from_static(b"read before the write"))
            })
            .await
            .expect("render");

        assert_eq!(body, Bytes::from_static(b"read before the write"));
        assert_eq!(cache.lookup(ORIGIN, "/feed/").await, Lookup::Miss);
    }
}
