//! In-process repositories.
//!
//! Used when no database is configured and by tests. State lives behind async
//! read/write locks; no lock is held across anything but the map access itself.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    application::repos::{
        EntriesRepo, EntriesWriteRepo, EntryFilter, LinksRepo, LinksWriteRepo, RepoError,
        entry_order, link_order,
    },
    domain::entities::{EntryRecord, LinkRecord},
};

#[derive(Default)]
pub struct InMemoryRepositories {
    entries: RwLock<BTreeMap<String, EntryRecord>>,
    links: RwLock<BTreeMap<String, LinkRecord>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, bypassing validation.
    pub async fn insert_entry(&self, entry: EntryRecord) {
        self.entries.write().await.insert(entry.slug.clone(), entry);
    }

    /// Seed a link directly, bypassing validation.
    pub async fn insert_link(&self, link: LinkRecord) {
        self.links.write().await.insert(link.url.clone(), link);
    }
}

#[async_trait]
impl EntriesRepo for InMemoryRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<EntryRecord>, RepoError> {
        Ok(self.entries.read().await.get(slug).cloned())
    }

    async fn list_entries(
        &self,
        filter: &EntryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EntryRecord>, RepoError> {
        let mut matching: Vec<EntryRecord> = self
            .entries
            .read()
            .await
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        matching.sort_by(entry_order);

        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl EntriesWriteRepo for InMemoryRepositories {
    async fn put_entry(&self, entry: &EntryRecord) -> Result<(), RepoError> {
        if entry.slug.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "entry slug must not be empty".into(),
            });
        }
        self.insert_entry(entry.clone()).await;
        Ok(())
    }
}

#[async_trait]
impl LinksRepo for InMemoryRepositories {
    async fn list_links(&self) -> Result<Vec<LinkRecord>, RepoError> {
        let mut links: Vec<LinkRecord> = self.links.read().await.values().cloned().collect();
        links.sort_by(link_order);
        Ok(links)
    }
}

#[async_trait]
impl LinksWriteRepo for InMemoryRepositories {
    async fn put_link(&self, link: &LinkRecord) -> Result<(), RepoError> {
        if link.url.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "link url must not be empty".into(),
            });
        }
        self.insert_link(link.clone()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn entry(slug: &str) -> EntryRecord {
        EntryRecord {
            author: "a".into(),
            is_hidden: false,
            is_page: false,
            allow_comments: false,
            publish_date: datetime!(2024-05-01 8:00 UTC),
            title: "Title".into(),
            content: b"body".to_vec(),
            slug: slug.into(),
            relative_url: format!("2024/05/{slug}"),
        }
    }

    #[tokio::test]
    async fn put_entry_upserts_by_slug() {
        let repo = InMemoryRepositories::new();
        repo.put_entry(&entry("hello")).await.expect("put");

        let mut edited = entry("hello");
        edited.title = "Edited".into();
        repo.put_entry(&edited).await.expect("put");

        let found = repo.find_by_slug("hello").await.expect("find");
        assert_eq!(found.map(|e| e.title), Some("Edited".to_string()));

        let filter = EntryFilter {
            is_page: false,
            include_hidden: true,
            published_from: None,
            published_before: None,
        };
        assert_eq!(repo.list_entries(&filter, 10, 0).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn offset_and_limit_apply_after_ordering() {
        let repo = InMemoryRepositories::new();
        for slug in ["c", "a", "b", "d"] {
            repo.put_entry(&entry(slug)).await.expect("put");
        }
        let filter = EntryFilter {
            is_page: false,
            include_hidden: false,
            published_from: None,
            published_before: None,
        };

        let page = repo.list_entries(&filter, 2, 1).await.expect("list");
        let slugs: Vec<_> = page.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, ["b", "c"]);
    }

    #[tokio::test]
    async fn put_link_upserts_by_url() {
        let repo = InMemoryRepositories::new();
        let mut link = LinkRecord {
            title: "Home".into(),
            url: "https://example.com".into(),
            order: 1,
        };
        repo.put_link(&link).await.expect("put");
        link.order = 7;
        repo.put_link(&link).await.expect("put");

        let links = repo.list_links().await.expect("list");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].order, 7);
    }

    #[tokio::test]
    async fn empty_keys_are_rejected() {
        let repo = InMemoryRepositories::new();
        assert!(matches!(
            repo.put_entry(&entry("")).await,
            Err(RepoError::InvalidInput { .. })
        ));
    }
}
