#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, Response,
        header::{CONTENT_TYPE, HOST},
    },
};
use bytes::Bytes;
use http_body_util::BodyExt;
use time::{OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use verbalize::{
    application::snippet::{DocumentSource, FetchError},
    cache::{CacheBackend, CacheConfig, MemoryCache},
    config::{self, Settings},
    domain::{entities::EntryRecord, entries::relative_url},
    infra::{
        app::{ApplicationContext, Repositories, build_application_context},
        http::{build_admin_router, build_router},
        memory::InMemoryRepositories,
    },
};

pub const HOSTNAME: &str = "example.test";

/// A remote document served from memory, counting every fetch.
pub struct StubDocuments {
    body: Result<Bytes, FetchError>,
    pub calls: AtomicUsize,
}

impl StubDocuments {
    pub fn serving(body: &'static str) -> Self {
        Self {
            body: Ok(Bytes::from_static(body.as_bytes())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: Err(FetchError::Status {
                url: "http://remote.test/doc".into(),
                status: 502,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for StubDocuments {
    async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body.clone()
    }
}

pub struct TestSite {
    pub repos: Arc<InMemoryRepositories>,
    pub documents: Arc<StubDocuments>,
    pub app: ApplicationContext,
    pub public: Router,
    pub admin: Router,
}

pub fn settings() -> Settings {
    let mut settings = config::load_defaults().expect("default settings");
    settings.site.title = "Test Site".into();
    settings.site.subtitle = "Notes".into();
    settings.site.version = "test-1".into();
    settings.site.more_tag = "[[more]]".into();
    settings.cache.page_ttl = Duration::from_secs(300);
    settings
}

pub fn site(settings: Settings) -> TestSite {
    site_with(settings, StubDocuments::serving(""), None)
}

pub fn site_with(
    settings: Settings,
    documents: StubDocuments,
    backend: Option<Arc<dyn CacheBackend>>,
) -> TestSite {
    let repos = Arc::new(InMemoryRepositories::new());
    let documents = Arc::new(documents);
    let backend = backend.unwrap_or_else(|| {
        Arc::new(MemoryCache::new(&CacheConfig::from(&settings.cache))) as Arc<dyn CacheBackend>
    });
    let app = build_application_context(
        &settings,
        Repositories::in_memory(repos.clone()),
        documents.clone(),
        backend,
    );
    let public = build_router(app.http_state.clone());
    let admin = build_admin_router(app.admin_state.clone());

    TestSite {
        repos,
        documents,
        app,
        public,
        admin,
    }
}

pub fn post(n: u8, publish_date: OffsetDateTime) -> EntryRecord {
    let slug = format!("post-{n}");
    EntryRecord {
        author: "writer".into(),
        is_hidden: false,
        is_page: false,
        allow_comments: true,
        publish_date,
        title: format!("Post {n}"),
        content: format!("Body of post {n}").into_bytes(),
        relative_url: relative_url(false, publish_date, &slug),
        slug,
    }
}

/// Seven visible posts, one per day; `Post 7` is the newest.
pub async fn seed_seven_posts(repos: &InMemoryRepositories) {
    let first = datetime!(2024-03-01 09:00 UTC);
    for n in 1..=7u8 {
        repos
            .insert_entry(post(n, first + time::Duration::days(i64::from(n))))
            .await;
    }
}

pub async fn get(router: &Router, uri: &str) -> (Response<Body>, String) {
    get_from(router, uri, HOSTNAME).await
}

pub async fn get_from(router: &Router, uri: &str, host: &str) -> (Response<Body>, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(HOST, host)
        .body(Body::empty())
        .expect("request should build");
    send(router, request).await
}

pub async fn post_form(router: &Router, uri: &str, form: &str) -> (Response<Body>, String) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(HOST, HOSTNAME)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("request should build");
    send(router, request).await
}

async fn send(router: &Router, request: Request<Body>) -> (Response<Body>, String) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let (parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let text = String::from_utf8_lossy(&bytes).into_owned();
    (Response::from_parts(parts, Body::empty()), text)
}
