//! Entry query engine.
//!
//! Translates declarative [`EntryQuery`] descriptors into repository calls,
//! applies the configured default page size and implements lookahead
//! pagination for archive listings. Every repository call is bounded by the
//! configured query timeout.

use std::{future::Future, num::NonZeroUsize, sync::Arc, time::Duration};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::{
    application::{
        pagination::{ArchivePage, PageNumber, split_lookahead},
        repos::{self, EntriesRepo, EntryFilter, LinksRepo, RepoError},
    },
    domain::entities::{EntryRecord, LinkRecord},
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no entry with slug `{slug}`")]
    NotFound { slug: String },
    #[error("entry lookups require a non-empty slug")]
    EmptySlug,
    #[error(transparent)]
    Storage(#[from] RepoError),
}

/// Declarative description of an entry listing.
///
/// There is no default: callers pick posts or pages explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    /// Inclusive lower bound on the publish date.
    pub start: Option<OffsetDateTime>,
    /// Exclusive upper bound on the publish date.
    pub end: Option<OffsetDateTime>,
    /// Entries to return. Zero means the configured page size.
    pub count: usize,
    pub include_hidden: bool,
    pub is_page: bool,
    pub offset: usize,
}

impl EntryQuery {
    pub fn posts() -> Self {
        Self::new(false)
    }

    pub fn pages() -> Self {
        Self::new(true)
    }

    fn new(is_page: bool) -> Self {
        Self {
            start: None,
            end: None,
            count: 0,
            include_hidden: false,
            is_page,
            offset: 0,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn including_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn published_from(mut self, start: OffsetDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn published_before(mut self, end: OffsetDateTime) -> Self {
        self.end = Some(end);
        self
    }

    fn filter(&self) -> EntryFilter {
        EntryFilter {
            is_page: self.is_page,
            include_hidden: self.include_hidden,
            published_from: self.start,
            published_before: self.end,
        }
    }
}

#[derive(Clone)]
pub struct EntryQueryService {
    entries: Arc<dyn EntriesRepo>,
    links: Arc<dyn LinksRepo>,
    default_count: NonZeroUsize,
    timeout: Duration,
}

impl EntryQueryService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        links: Arc<dyn LinksRepo>,
        default_count: NonZeroUsize,
        timeout: Duration,
    ) -> Self {
        Self {
            entries,
            links,
            default_count,
            timeout,
        }
    }

    pub fn default_count(&self) -> usize {
        self.default_count.get()
    }

    /// Entries matching `query`, newest first.
    #[instrument(skip(self), fields(is_page = query.is_page, offset = query.offset))]
    pub async fn query_entries(&self, query: &EntryQuery) -> Result<Vec<EntryRecord>, QueryError> {
        let count = if query.count == 0 {
            self.default_count()
        } else {
            query.count
        };
        let filter = query.filter();

        let entries = self
            .bounded("list_entries", self.entries.list_entries(&filter, count, query.offset))
            .await
            .inspect_err(|err| {
                warn!(
                    error = %err,
                    ?query,
                    count,
                    "entry query failed"
                );
            })?;

        debug!(count, returned = entries.len(), "entries queried");
        Ok(entries)
    }

    /// One archive page, using a single extra row to detect whether another page follows.
    ///
    /// A zero `per_page` uses the configured page size.
    pub async fn query_page(
        &self,
        is_page: bool,
        page: PageNumber,
        per_page: usize,
        include_hidden: bool,
    ) -> Result<ArchivePage<EntryRecord>, QueryError> {
        let per_page = if per_page == 0 {
            self.default_count()
        } else {
            per_page
        };
        let base = if is_page {
            EntryQuery::pages()
        } else {
            EntryQuery::posts()
        };
        let query = base
            .including_hidden(include_hidden)
            .with_offset(page.offset(per_page))
            .with_count(per_page.saturating_add(1));

        let rows = self.query_entries(&query).await?;
        let (items, has_more) = split_lookahead(rows, per_page);
        Ok(ArchivePage {
            items,
            page,
            has_more,
        })
    }

    /// Look up a single entry by its exact slug.
    #[instrument(skip(self))]
    pub async fn query_single(&self, slug: &str) -> Result<EntryRecord, QueryError> {
        self.find_entry(slug)
            .await?
            .ok_or_else(|| QueryError::NotFound {
                slug: slug.to_string(),
            })
    }

    /// Like [`Self::query_single`], but absence is not an error.
    pub async fn find_entry(&self, slug: &str) -> Result<Option<EntryRecord>, QueryError> {
        if slug.is_empty() {
            return Err(QueryError::EmptySlug);
        }

        self.bounded("find_by_slug", self.entries.find_by_slug(slug))
            .await
            .inspect_err(|err| warn!(error = %err, slug, "entry lookup failed"))
            .map_err(QueryError::from)
    }

    /// Every link, ordered by position then title.
    pub async fn query_links(&self) -> Result<Vec<LinkRecord>, QueryError> {
        self.bounded("list_links", self.links.list_links())
            .await
            .inspect_err(|err| warn!(error = %err, "link query failed"))
            .map_err(QueryError::from)
    }

    /// Deadline applied to every repository call, reads and writes alike.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        repos::bounded(op, self.timeout, fut).await
    }
}
