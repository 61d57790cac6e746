//! Wiring of repositories, cache and services into router states.

use std::sync::Arc;

use crate::{
    application::{
        content::ContentService,
        query::EntryQueryService,
        repos::{EntriesRepo, EntriesWriteRepo, LinksRepo, LinksWriteRepo},
        site::SiteService,
        snippet::{DocumentSource, SnippetConfig, SnippetFetcher},
    },
    cache::{CacheBackend, CacheConfig, PageCache},
    config::Settings,
    infra::{
        db::PostgresRepositories,
        http::{AdminState, HttpState},
        memory::InMemoryRepositories,
    },
};

/// Read and write halves of the content repository.
#[derive(Clone)]
pub struct Repositories {
    pub entries: Arc<dyn EntriesRepo>,
    pub entries_write: Arc<dyn EntriesWriteRepo>,
    pub links: Arc<dyn LinksRepo>,
    pub links_write: Arc<dyn LinksWriteRepo>,
}

impl Repositories {
    pub fn in_memory(repos: Arc<InMemoryRepositories>) -> Self {
        Self {
            entries: repos.clone(),
            entries_write: repos.clone(),
            links: repos.clone(),
            links_write: repos,
        }
    }

    pub fn postgres(repos: Arc<PostgresRepositories>) -> Self {
        Self {
            entries: repos.clone(),
            entries_write: repos.clone(),
            links: repos.clone(),
            links_write: repos,
        }
    }
}

pub struct ApplicationContext {
    pub http_state: HttpState,
    pub admin_state: AdminState,
    pub cache: PageCache,
}

/// Build every service from settings. The backend is shared by pages and snippets.
pub fn build_application_context(
    settings: &Settings,
    repositories: Repositories,
    documents: Arc<dyn DocumentSource>,
    backend: Arc<dyn CacheBackend>,
) -> ApplicationContext {
    let cache_config = CacheConfig::from(&settings.cache);
    let site_settings = Arc::new(settings.site.clone());

    let cache = PageCache::new(backend.clone(), cache_config.clone(), &site_settings.version);
    let queries = EntryQueryService::new(
        repositories.entries,
        repositories.links,
        site_settings.entries_per_page,
        settings.database.query_timeout,
    );
    let snippets = SnippetFetcher::new(
        documents,
        backend,
        SnippetConfig {
            ttl: settings.snippets.ttl,
            operation_timeout: cache_config.operation_timeout,
        },
    );

    let site = SiteService::new(queries.clone(), snippets, cache.clone(), site_settings.clone());
    let content = ContentService::new(
        queries,
        repositories.entries_write,
        repositories.links_write,
        cache.clone(),
        site_settings.default_author.clone(),
    );

    ApplicationContext {
        http_state: HttpState::new(site.clone()),
        admin_state: AdminState::new(site, content),
        cache,
    }
}
