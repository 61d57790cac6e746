//! Rendering pipeline for the public site.
//!
//! Resolves a request path to an archive page or a single entry, queries the
//! content it needs, resolves configured embeds and renders the matching
//! template. Public reads go through the [`PageCache`]; nothing here writes.

use std::{sync::Arc, time::Duration};

use askama::Template;
use bytes::Bytes;
use futures::future::join_all;
use metrics::histogram;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::{
    application::{
        pagination::{ArchivePage, PageNumber},
        query::{EntryQuery, EntryQueryService, QueryError},
        snippet::SnippetFetcher,
    },
    cache::PageCache,
    config::SiteSettings,
    domain::entities::{EntryRecord, LinkRecord},
    presentation::views::{
        ArchiveTemplate, EmbedView, EntryContext, EntryTemplate, FeedTemplate, LinkView,
        PageTemplate, RenderContext,
    },
};

pub const METRIC_RENDER_MS: &str = "verbalize_render_ms";
pub const FEED_PATH: &str = "/feed/";

#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("archive page {page} is past the last entry")]
    PageOutOfRange { page: PageNumber },
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

impl SiteError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SiteError::PageOutOfRange { .. }
                | SiteError::Query(QueryError::NotFound { .. } | QueryError::EmptySlug)
        )
    }
}

/// What a public path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Archive(PageNumber),
    Entry { slug: String },
}

/// `/` and `/{n}` (n ≥ 1) are archive pages; anything else names an entry by its last segment.
pub fn resolve_path(path: &str) -> Route {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => Route::Archive(PageNumber::FIRST),
        [single] => match single.parse::<PageNumber>() {
            Ok(page) => Route::Archive(page),
            Err(_) => Route::Entry {
                slug: (*single).to_string(),
            },
        },
        [.., last] => Route::Entry {
            slug: (*last).to_string(),
        },
    }
}

/// Scheme and host the request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Absolute base URL for a site mounted at `subdirectory` (no trailing slash).
    pub fn base_url(&self, subdirectory: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, subdirectory)
    }

    /// Part of the page cache key. Rendered links embed scheme and host.
    pub fn cache_scope(&self) -> String {
        self.base_url("")
    }
}

#[derive(Clone)]
pub struct SiteService {
    queries: EntryQueryService,
    snippets: SnippetFetcher,
    cache: PageCache,
    site: Arc<SiteSettings>,
}

impl SiteService {
    pub fn new(
        queries: EntryQueryService,
        snippets: SnippetFetcher,
        cache: PageCache,
        site: Arc<SiteSettings>,
    ) -> Self {
        Self {
            queries,
            snippets,
            cache,
            site,
        }
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.site
    }

    pub fn queries(&self) -> &EntryQueryService {
        &self.queries
    }

    /// Render a public path through the page cache.
    #[instrument(skip(self, origin))]
    pub async fn render_path(&self, path: &str, origin: &RequestOrigin) -> Result<Bytes, SiteError> {
        let route = resolve_path(path);
        self.cache
            .get_or_render(&origin.cache_scope(), path, self.cache.page_ttl(), || {
                self.render_route(route, origin)
            })
            .await
    }

    /// Render the Atom feed through the page cache. Only writes invalidate it.
    #[instrument(skip(self, origin))]
    pub async fn render_feed(&self, origin: &RequestOrigin) -> Result<Bytes, SiteError> {
        self.cache
            .get_or_render(&origin.cache_scope(), FEED_PATH, Duration::ZERO, || {
                self.render_feed_uncached(origin)
            })
            .await
    }

    /// Render a resolved route without consulting the cache.
    pub async fn render_route(&self, route: Route, origin: &RequestOrigin) -> Result<Bytes, SiteError> {
        let started_at = Instant::now();
        let (kind, body) = match route {
            Route::Archive(page) => ("archive", self.render_archive(page, origin).await?),
            Route::Entry { slug } => ("entry", self.render_entry(&slug, origin).await?),
        };
        histogram!(METRIC_RENDER_MS, "template" => kind)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(body)
    }

    async fn render_archive(&self, page: PageNumber, origin: &RequestOrigin) -> Result<Bytes, SiteError> {
        let archive = self
            .queries
            .query_page(false, page, self.site.entries_per_page.get(), false)
            .await?;
        if archive.is_empty() && !page.is_first() {
            return Err(SiteError::PageOutOfRange { page });
        }
        let links = self.queries.query_links().await?;

        debug!(page = page.get(), entries = archive.items.len(), has_more = archive.has_more, "rendering archive");
        let mut view = self
            .context(origin, &self.site.subtitle, "archive", &archive.items, &links)
            .await;
        apply_archive_links(&mut view, &archive, "");

        Ok(Bytes::from(ArchiveTemplate { view }.render()?))
    }

    async fn render_entry(&self, slug: &str, origin: &RequestOrigin) -> Result<Bytes, SiteError> {
        let entry = self.queries.query_single(slug).await?;
        let links = self.queries.query_links().await?;

        let page_id = if entry.is_page { "page" } else { "entry" };
        let view = self
            .context(origin, &entry.title, page_id, std::slice::from_ref(&entry), &links)
            .await;

        let html = if entry.is_page {
            PageTemplate { view }.render()?
        } else {
            EntryTemplate { view }.render()?
        };
        Ok(Bytes::from(html))
    }

    async fn render_feed_uncached(&self, origin: &RequestOrigin) -> Result<Bytes, SiteError> {
        let started_at = Instant::now();
        let entries = self.queries.query_entries(&EntryQuery::posts()).await?;
        let mut view = self.chrome(origin, "Atom Feed", "feed");
        view.entries = self.entry_contexts(&entries);

        let body = Bytes::from(FeedTemplate { view }.render()?);
        histogram!(METRIC_RENDER_MS, "template" => "feed")
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(body)
    }

    /// Full template context: site chrome, entries, links and resolved embeds.
    pub async fn context(
        &self,
        origin: &RequestOrigin,
        page_title: &str,
        page_id: &str,
        entries: &[EntryRecord],
        links: &[LinkRecord],
    ) -> RenderContext {
        let mut view = self.chrome(origin, page_title, page_id);
        view.entries = self.entry_contexts(entries);
        view.links = links.iter().map(LinkView::from).collect();
        view.embeds = self.resolve_embeds().await;
        view
    }

    /// Site-wide context without entries, links or embeds.
    pub fn chrome(&self, origin: &RequestOrigin, page_title: &str, page_id: &str) -> RenderContext {
        let mut view = RenderContext {
            site_title: self.site.title.clone(),
            site_subtitle: self.site.subtitle.clone(),
            site_description: self.site.description.clone(),
            site_theme: self.site.theme.clone(),
            base_url: origin.base_url(&self.site.subdirectory),
            version: self.site.version.clone(),
            page_title: page_title.to_string(),
            page_id: page_id.to_string(),
            page_time_rfc3339: String::new(),
            page_timestamp: 0,
            entries: Vec::new(),
            links: Vec::new(),
            previous_url: None,
            next_url: None,
            disqus_id: self.site.disqus_id.clone(),
            analytics_id: self.site.analytics_id.clone(),
            analytics_domain: self.site.analytics_domain.clone(),
            countdown: self.site.countdown.clone(),
            embeds: Vec::new(),
        };
        view.stamp_now();
        view
    }

    pub fn entry_contexts(&self, entries: &[EntryRecord]) -> Vec<EntryContext> {
        entries
            .iter()
            .map(|entry| EntryContext::from_entry(entry, &self.site.more_tag))
            .collect()
    }

    /// Fetch every configured embed concurrently. A failure only marks that embed.
    async fn resolve_embeds(&self) -> Vec<EmbedView> {
        let fetches = self.site.embeds.iter().map(|embed| async move {
            match self
                .snippets
                .fetch_snippet(&embed.url, &embed.start_token, &embed.end_token)
                .await
            {
                Ok(html) => EmbedView {
                    name: embed.name.clone(),
                    url: embed.url.clone(),
                    html,
                    failed: false,
                },
                Err(_) => EmbedView {
                    name: embed.name.clone(),
                    url: embed.url.clone(),
                    html: String::new(),
                    failed: true,
                },
            }
        });
        join_all(fetches).await
    }
}

/// Copy an archive page's neighbour paths into `view`, under `prefix`.
pub fn apply_archive_links<T>(view: &mut RenderContext, archive: &ArchivePage<T>, prefix: &str) {
    view.previous_url = archive.previous_path().map(|path| format!("{prefix}{path}"));
    view.next_url = archive.next_path().map(|path| format!("{prefix}{path}"));
}
