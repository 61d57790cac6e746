//! Verbalize Cache System
//!
//! A read-through page cache in front of the rendering pipeline, plus the
//! storage used by the external snippet fetcher. Both talk to a [`CacheBackend`],
//! which behaves like a shared memcache-style service:
//!
//! - `get` reports a hit, a miss or a backend error;
//! - `add` stores only when no live entry exists;
//! - `flush_all` clears everything and is the only invalidation mechanism.
//!
//! Backend failures never escape this module: reads degrade to a miss and
//! writes are logged and dropped.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 512
//! page_ttl_seconds = 300
//! operation_timeout_ms = 250
//! ```

mod backend;
mod config;
mod keys;
mod lock;
mod page;
mod store;

pub use backend::{CacheBackend, CacheError, bounded};
pub use config::CacheConfig;
pub use keys::{CacheKey, normalize_path};
pub use page::{
    Lookup, METRIC_CACHE_FLUSH_TOTAL, METRIC_PAGE_CACHE_ERROR_TOTAL, METRIC_PAGE_CACHE_HIT_TOTAL,
    METRIC_PAGE_CACHE_MISS_TOTAL, PageCache,
};
pub use store::MemoryCache;
