//! Write path for entries and links.
//!
//! Submissions are normalised and validated before any repository write. A
//! successful write flushes the whole page cache so the next read never
//! observes stale output.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    application::{
        query::{EntryQueryService, QueryError},
        repos::{EntriesWriteRepo, LinksWriteRepo, RepoError, bounded},
    },
    cache::PageCache,
    domain::{
        entities::{EntryRecord, LinkRecord},
        entries::relative_url,
        error::DomainError,
        slug::{SlugAsyncError, generate_unique_slug_async, validate_slug},
    },
};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<QueryError>> for ContentError {
    fn from(err: SlugAsyncError<QueryError>) -> Self {
        match err {
            SlugAsyncError::Slug(inner) => ContentError::Domain(inner.into()),
            SlugAsyncError::Predicate(inner) => ContentError::Query(inner),
        }
    }
}

/// Entry form as submitted by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySubmission {
    /// Create a new entry instead of editing the one named by `slug`.
    pub is_new: bool,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_page: bool,
    pub is_hidden: bool,
    pub allow_comments: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSubmission {
    pub url: String,
    pub title: String,
    /// Free-form sort key; anything that is not an integer sorts as 0.
    pub order: String,
}

#[derive(Clone)]
pub struct ContentService {
    queries: EntryQueryService,
    entries: Arc<dyn EntriesWriteRepo>,
    links: Arc<dyn LinksWriteRepo>,
    cache: PageCache,
    default_author: String,
}

impl ContentService {
    pub fn new(
        queries: EntryQueryService,
        entries: Arc<dyn EntriesWriteRepo>,
        links: Arc<dyn LinksWriteRepo>,
        cache: PageCache,
        default_author: impl Into<String>,
    ) -> Self {
        Self {
            queries,
            entries,
            links,
            cache,
            default_author: default_author.into(),
        }
    }

    /// Create or update an entry, then flush the page cache.
    #[instrument(skip(self, submission), fields(slug = %submission.slug, is_new = submission.is_new))]
    pub async fn submit_entry(&self, submission: EntrySubmission) -> Result<EntryRecord, ContentError> {
        let title = submission.title.trim();
        let content = submission.content.trim();
        let slug = submission.slug.trim();
        let author = submission.author.trim();

        if title.is_empty() {
            return Err(DomainError::validation("title must not be empty").into());
        }
        if content.is_empty() {
            return Err(DomainError::validation("content must not be empty").into());
        }

        let (slug, author, publish_date) = if submission.is_new {
            let slug = self.new_slug(slug, title).await?;
            let author = if author.is_empty() {
                self.default_author.clone()
            } else {
                author.to_string()
            };
            (slug, author, OffsetDateTime::now_utc())
        } else {
            validate_slug(slug).map_err(DomainError::from)?;
            let existing = self.queries.query_single(slug).await?;
            (existing.slug, existing.author, existing.publish_date)
        };

        let entry = EntryRecord {
            relative_url: relative_url(submission.is_page, publish_date, &slug),
            author,
            is_hidden: submission.is_hidden,
            is_page: submission.is_page,
            allow_comments: submission.allow_comments,
            publish_date,
            title: title.to_string(),
            content: content.as_bytes().to_vec(),
            slug,
        };

        bounded("put_entry", self.queries.timeout(), self.entries.put_entry(&entry)).await?;
        self.cache.flush().await;

        info!(
            target = "verbalize::application::content",
            slug = %entry.slug,
            is_page = entry.is_page,
            "entry stored"
        );
        Ok(entry)
    }

    /// Create or update a link keyed by its URL, then flush the page cache.
    #[instrument(skip(self, submission), fields(url = %submission.url))]
    pub async fn submit_link(&self, submission: LinkSubmission) -> Result<LinkRecord, ContentError> {
        let url = submission.url.trim();
        let title = submission.title.trim();

        if url.is_empty() {
            return Err(DomainError::validation("link url must not be empty").into());
        }
        if title.is_empty() {
            return Err(DomainError::validation("link title must not be empty").into());
        }

        let link = LinkRecord {
            title: title.to_string(),
            url: url.to_string(),
            order: parse_order(&submission.order),
        };

        bounded("put_link", self.queries.timeout(), self.links.put_link(&link)).await?;
        self.cache.flush().await;

        info!(
            target = "verbalize::application::content",
            url = %link.url,
            order = link.order,
            "link stored"
        );
        Ok(link)
    }

    async fn new_slug(&self, requested: &str, title: &str) -> Result<String, ContentError> {
        if requested.is_empty() {
            let queries = self.queries.clone();
            let slug = generate_unique_slug_async(title, |candidate| {
                let queries = queries.clone();
                let candidate = candidate.to_string();
                async move {
                    queries
                        .find_entry(&candidate)
                        .await
                        .map(|existing| existing.is_none())
                }
            })
            .await?;
            return Ok(slug);
        }

        validate_slug(requested).map_err(DomainError::from)?;
        if self.queries.find_entry(requested).await?.is_some() {
            return Err(DomainError::validation(format!("slug `{requested}` is already in use")).into());
        }
        Ok(requested.to_string())
    }
}

fn parse_order(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}
