//! Template contexts and compiled templates for the public site.
//!
//! Contexts are read-only projections built fresh for each render. Entry
//! titles and bodies are trusted author HTML and are emitted unescaped.

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        template_fns,
    },
    domain::{
        entities::{EntryRecord, LinkRecord},
        excerpt::excerpt_and_flag,
    },
};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Unable to render",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// 404 page rendered inside the site chrome.
pub fn render_not_found_response(view: RenderContext, message: &str) -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            view,
            message: message.to_string(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        message,
    )
    .attach(&mut response);
    response
}

/// Template projection of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryContext {
    pub author: String,
    pub is_hidden: bool,
    pub is_page: bool,
    pub allow_comments: bool,
    /// Publish time as Unix seconds.
    pub timestamp: i64,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub month: u8,
    pub month_name: String,
    pub year: i32,
    pub rfc_date: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    /// Same text as `excerpt`, meant for escaped output such as feed summaries.
    pub escaped_excerpt: String,
    pub is_excerpted: bool,
    pub relative_url: String,
    pub slug: String,
}

impl EntryContext {
    pub fn from_entry(entry: &EntryRecord, more_tag: &str) -> Self {
        let (excerpt, is_excerpted) = excerpt_and_flag(&entry.content, more_tag.as_bytes());
        let excerpt = String::from_utf8_lossy(excerpt).into_owned();
        let date = entry.publish_date;

        Self {
            author: entry.author.clone(),
            is_hidden: entry.is_hidden,
            is_page: entry.is_page,
            allow_comments: entry.allow_comments,
            timestamp: date.unix_timestamp(),
            day: date.day(),
            hour: date.hour(),
            minute: date.minute(),
            month: u8::from(date.month()),
            month_name: date.month().to_string(),
            year: date.year(),
            rfc_date: rfc3339(date),
            title: entry.title.clone(),
            content: String::from_utf8_lossy(&entry.content).into_owned(),
            escaped_excerpt: excerpt.clone(),
            excerpt,
            is_excerpted,
            relative_url: entry.relative_url.clone(),
            slug: entry.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkView {
    pub title: String,
    pub url: String,
    pub order: i64,
}

impl From<&LinkRecord> for LinkView {
    fn from(link: &LinkRecord) -> Self {
        Self {
            title: link.title.clone(),
            url: link.url.clone(),
            order: link.order,
        }
    }
}

/// An external snippet resolved before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedView {
    pub name: String,
    pub url: String,
    pub html: String,
    /// The fetch failed; `html` is empty.
    pub failed: bool,
}

/// Site-wide data shared by every template.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub site_title: String,
    pub site_subtitle: String,
    pub site_description: String,
    pub site_theme: String,
    /// Scheme, host and subdirectory, without a trailing slash.
    pub base_url: String,
    pub version: String,
    pub page_title: String,
    pub page_id: String,
    pub page_time_rfc3339: String,
    /// Render time in Unix milliseconds.
    pub page_timestamp: i64,
    pub entries: Vec<EntryContext>,
    pub links: Vec<LinkView>,
    pub previous_url: Option<String>,
    pub next_url: Option<String>,
    pub disqus_id: Option<String>,
    pub analytics_id: Option<String>,
    pub analytics_domain: Option<String>,
    pub countdown: Option<String>,
    pub embeds: Vec<EmbedView>,
}

impl RenderContext {
    pub fn stamp_now(&mut self) {
        let now = OffsetDateTime::now_utc();
        self.page_time_rfc3339 = rfc3339(now);
        self.page_timestamp = (now.unix_timestamp_nanos() / 1_000_000) as i64;
    }

    /// Days left until the configured countdown date, hidden once it has passed.
    pub fn countdown_days(&self) -> Option<i64> {
        self.countdown
            .as_deref()
            .map(template_fns::days_until)
            .filter(|days| *days >= 0)
    }

    pub fn is_page_id(&self, id: &str) -> bool {
        template_fns::eq_str(&self.page_id, id)
    }

    /// Absolute URL of a site-relative path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn rfc3339(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}

#[derive(Template)]
#[template(path = "archive.html")]
pub struct ArchiveTemplate {
    pub view: RenderContext,
}

#[derive(Template)]
#[template(path = "entry.html")]
pub struct EntryTemplate {
    pub view: RenderContext,
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub view: RenderContext,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: RenderContext,
    pub message: String,
}

#[derive(Template)]
#[template(path = "feed.xml")]
pub struct FeedTemplate {
    pub view: RenderContext,
}
