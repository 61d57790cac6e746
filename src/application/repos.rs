//! Repository traits describing persistence adapters.
//!
//! Entries are keyed by slug and links by URL; every `put` is an upsert on that
//! key. Listing order is part of the contract so adapters agree on pagination.

use std::{cmp::Ordering, future::Future, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use crate::domain::entities::{EntryRecord, LinkRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Conjunctive filter applied by [`EntriesRepo::list_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    pub is_page: bool,
    pub include_hidden: bool,
    /// Inclusive lower bound on `publish_date`.
    pub published_from: Option<OffsetDateTime>,
    /// Exclusive upper bound on `publish_date`.
    pub published_before: Option<OffsetDateTime>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &EntryRecord) -> bool {
        entry.is_page == self.is_page
            && (self.include_hidden || !entry.is_hidden)
            && self
                .published_from
                .is_none_or(|from| entry.publish_date >= from)
            && self
                .published_before
                .is_none_or(|before| entry.publish_date < before)
    }
}

/// Listing order for entries: newest first, slug ascending on ties.
pub fn entry_order(a: &EntryRecord, b: &EntryRecord) -> Ordering {
    b.publish_date
        .cmp(&a.publish_date)
        .then_with(|| a.slug.cmp(&b.slug))
}

/// Listing order for links: `order` ascending, then title.
pub fn link_order(a: &LinkRecord, b: &LinkRecord) -> Ordering {
    a.order.cmp(&b.order).then_with(|| a.title.cmp(&b.title))
}

/// Run a repository call under `limit`, mapping expiry to [`RepoError::Timeout`].
pub async fn bounded<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                op,
                timeout_ms = limit.as_millis() as u64,
                "repository call timed out"
            );
            Err(RepoError::Timeout)
        }
    }
}

#[async_trait]
pub trait EntriesRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<EntryRecord>, RepoError>;

    /// Matching entries in [`entry_order`], skipping `offset` and returning at most `limit`.
    async fn list_entries(
        &self,
        filter: &EntryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EntryRecord>, RepoError>;
}

#[async_trait]
pub trait EntriesWriteRepo: Send + Sync {
    async fn put_entry(&self, entry: &EntryRecord) -> Result<(), RepoError>;
}

#[async_trait]
pub trait LinksRepo: Send + Sync {
    /// Every link in [`link_order`].
    async fn list_links(&self) -> Result<Vec<LinkRecord>, RepoError>;
}

#[async_trait]
pub trait LinksWriteRepo: Send + Sync {
    async fn put_link(&self, link: &LinkRecord) -> Result<(), RepoError>;
}
