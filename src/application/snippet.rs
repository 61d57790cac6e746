//! External snippet fetcher.
//!
//! Pulls the region of a remote document delimited by two marker tokens so it
//! can be embedded into a page. Results are cached per (url, start, end) triple.
//!
//! Scanning is line oriented: each token must sit on a single line. A line
//! containing the start token opens the window and is captured; a line
//! containing the end token closes it. A line that opens and closes at once is
//! captured on its own. Captured lines are concatenated without their line
//! terminators.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheBackend, CacheError, CacheKey, bounded},
    util::bytes::contains,
};

pub const METRIC_SNIPPET_FETCH_TOTAL: &str = "verbalize_snippet_fetch_total";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to `{url}` failed: {message}")]
    Request { url: String, message: String },
    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to `{url}` timed out")]
    Timeout { url: String },
    #[error("`{url}` returned more than {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// Source of remote documents, typically an HTTP client.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the full body of `url`. Non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Settings for [`SnippetFetcher`].
#[derive(Debug, Clone, Copy)]
pub struct SnippetConfig {
    /// Lifetime of extracted snippets. Zero keeps them until the next flush.
    pub ttl: Duration,
    /// Upper bound on each cache operation.
    pub operation_timeout: Duration,
}

#[derive(Clone)]
pub struct SnippetFetcher {
    source: Arc<dyn DocumentSource>,
    cache: Arc<dyn CacheBackend>,
    config: SnippetConfig,
}

impl SnippetFetcher {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        cache: Arc<dyn CacheBackend>,
        config: SnippetConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    /// Text of `url` between `start_token` and `end_token`, from cache when possible.
    pub async fn fetch_snippet(
        &self,
        url: &str,
        start_token: &str,
        end_token: &str,
    ) -> Result<String, FetchError> {
        let key = CacheKey::snippet(url, start_token, end_token).encode();

        match self.cached(&key).await {
            Ok(Some(body)) => {
                counter!(METRIC_SNIPPET_FETCH_TOTAL, "outcome" => "hit").increment(1);
                debug!(cache = "snippet", outcome = "hit", url, "serving cached snippet");
                return Ok(String::from_utf8_lossy(&body).into_owned());
            }
            Ok(None) => {
                debug!(cache = "snippet", outcome = "miss", url, "snippet not cached");
            }
            Err(err) => {
                warn!(
                    cache = "snippet",
                    outcome = "error",
                    url,
                    error = %err,
                    "snippet cache read failed; fetching"
                );
            }
        }

        let document = self.source.fetch(url).await.inspect_err(|err| {
            counter!(METRIC_SNIPPET_FETCH_TOTAL, "outcome" => "error").increment(1);
            warn!(url, error = %err, "snippet fetch failed");
        })?;
        counter!(METRIC_SNIPPET_FETCH_TOTAL, "outcome" => "fetched").increment(1);

        let extract = extract_window(&document, start_token.as_bytes(), end_token.as_bytes());
        info!(
            url,
            document_bytes = document.len(),
            extract_bytes = extract.len(),
            "snippet extracted"
        );

        let extract = Bytes::from(extract);
        self.store(&key, extract.clone()).await;
        Ok(String::from_utf8_lossy(&extract).into_owned())
    }

    async fn cached(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        bounded("get", self.config.operation_timeout, self.cache.get(key)).await
    }

    async fn store(&self, key: &str, body: Bytes) {
        let outcome = bounded(
            "add",
            self.config.operation_timeout,
            self.cache.add(key, body, self.config.ttl),
        )
        .await;
        if let Err(err) = outcome {
            debug!(cache = "snippet", key, error = %err, "snippet not cached");
        }
    }
}

/// Lines of `document` that fall inside the `start`..`end` window, concatenated.
pub fn extract_window(document: &[u8], start: &[u8], end: &[u8]) -> Vec<u8> {
    let mut extract = Vec::new();
    let mut inside = false;

    for line in lines(document) {
        let opens = contains(line, start);
        if opens {
            inside = true;
        }
        if contains(line, end) {
            inside = false;
        }
        if inside || opens {
            extract.extend_from_slice(line);
        }
    }

    extract
}

/// Split on `\n`, dropping a trailing `\r` per line and the empty tail after a final newline.
fn lines(document: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = document.strip_suffix(b"\n").unwrap_or(document);
    let empty = document.is_empty();
    body.split(|byte| *byte == b'\n')
        .filter(move |_| !empty)
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::{CacheConfig, MemoryCache};

    struct StaticSource {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentSource for StaticSource {
        async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(self.body.as_bytes()))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl DocumentSource for FailingSource {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 502,
            })
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheBackend for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn add(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    fn config() -> SnippetConfig {
        SnippetConfig {
            ttl: Duration::from_secs(600),
            operation_timeout: Duration::from_millis(250),
        }
    }

    fn fetcher(source: Arc<dyn DocumentSource>, cache: Arc<dyn CacheBackend>) -> SnippetFetcher {
        SnippetFetcher::new(source, cache, config())
    }

    fn memory() -> Arc<dyn CacheBackend> {
        Arc::new(MemoryCache::new(&CacheConfig::default()))
    }

    #[test]
    fn captures_lines_between_tokens() {
        let doc = b"head\n<!--s-->\nalpha\nbeta\n<!--e-->\ntail\n";
        assert_eq!(
            extract_window(doc, b"<!--s-->", b"<!--e-->"),
            b"<!--s-->alphabeta".to_vec()
        );
    }

    #[test]
    fn single_line_window_is_captured() {
        // The opening line is kept even when it also closes the window; tracking
        // the open/closed state alone would end false here and drop it.
        let doc = b"before\n<b><!--s-->quote<!--e--></b>\nafter";
        assert_eq!(
            extract_window(doc, b"<!--s-->", b"<!--e-->"),
            b"<b><!--s-->quote<!--e--></b>".to_vec()
        );
    }

    #[test]
    fn missing_tokens_yield_empty_extract() {
        assert!(extract_window(b"one\ntwo\n", b"[start]", b"[end]").is_empty());
        assert!(extract_window(b"", b"[start]", b"[end]").is_empty());
    }

    #[test]
    fn unterminated_window_runs_to_end() {
        let doc = b"x\n[start]\ny\nz";
        assert_eq!(extract_window(doc, b"[start]", b"[end]"), b"[start]yz".to_vec());
    }

    #[test]
    fn carriage_returns_are_stripped() {
        let doc = b"[start]\r\nline\r\n[end]\r\n";
        assert_eq!(extract_window(doc, b"[start]", b"[end]"), b"[start]line".to_vec());
    }

    #[test]
    fn tokens_split_across_lines_do_not_match() {
        let doc = b"[sta\nrt]\nbody\n[end]";
        assert!(extract_window(doc, b"[start]", b"[end]").is_empty());
    }

    #[test]
    fn window_can_reopen() {
        let doc = b"[s]a\nb\n[e]\nc\n[s]d\n[e]";
        assert_eq!(extract_window(doc, b"[s]", b"[e]"), b"[s]ab[s]d".to_vec());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let source = Arc::new(StaticSource::new(
            "noise\n<p><!--s-->hello<!--e--></p>\nmore noise\n",
        ));
        let fetcher = fetcher(source.clone(), memory());

        let first = fetcher
            .fetch_snippet("https://example.com/doc", "<!--s-->", "<!--e-->")
            .await
            .expect("fetch");
        let second = fetcher
            .fetch_snippet("https://example.com/doc", "<!--s-->", "<!--e-->")
            .await
            .expect("cached");

        assert_eq!(first, "<p><!--s-->hello<!--e--></p>");
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_extract_is_cached_too() {
        let source = Arc::new(StaticSource::new("nothing to see\n"));
        let fetcher = fetcher(source.clone(), memory());

        for _ in 0..2 {
            let extract = fetcher
                .fetch_snippet("https://example.com", "[s]", "[e]")
                .await
                .expect("fetch");
            assert!(extract.is_empty());
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_not_cached() {
        let cache = memory();
        let fetcher = fetcher(Arc::new(FailingSource), cache.clone());

        let result = fetcher.fetch_snippet("https://down.example", "[s]", "[e]").await;
        assert!(matches!(result, Err(FetchError::Status { status: 502, .. })));

        let key = CacheKey::snippet("https://down.example", "[s]", "[e]").encode();
        assert_eq!(cache.get(&key).await, Ok(None));
    }

    #[tokio::test]
    async fn broken_cache_does_not_fail_the_fetch() {
        let source = Arc::new(StaticSource::new("[s]x[e]\n"));
        let fetcher = fetcher(source.clone(), Arc::new(BrokenCache));

        let extract = fetcher
            .fetch_snippet("https://example.com", "[s]", "[e]")
            .await
            .expect("fetch despite cache");
        assert_eq!(extract, "[s]x[e]");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_snippet_is_refetched() {
        let source = Arc::new(StaticSource::new("[s]x\n"));
        let fetcher = fetcher(source.clone(), memory());

        fetcher
            .fetch_snippet("https://example.com", "[s]", "[e]")
            .await
            .expect("fetch");
        tokio::time::advance(Duration::from_secs(601)).await;
        fetcher
            .fetch_snippet("https://example.com", "[s]", "[e]")
            .await
            .expect("refetch");

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
