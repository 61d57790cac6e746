use axum::{
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    application::{content::EntrySubmission, error::HttpError, pagination::PageNumber},
    infra::http::{
        admin::{
            AdminState,
            shared::{blank_to_none_opt, is_checked, parse_form_bool, redirect_found, with_query},
        },
        request_origin,
    },
    presentation::{
        admin::views::{AdminEditTemplate, AdminEntriesTemplate, EditFormView},
        views::render_template_response,
    },
};

const POSTS_PATH: &str = "/admin";
const PAGES_PATH: &str = "/admin/pages";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminListQuery {
    page: Option<String>,
    added: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminEditQuery {
    slug: Option<String>,
    is_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminEntryForm {
    is_new_post: Option<String>,
    slug: String,
    title: String,
    content: String,
    author: String,
    is_page: Option<String>,
    hidden: Option<String>,
    allow_comments: Option<String>,
}

impl From<AdminEntryForm> for EntrySubmission {
    fn from(form: AdminEntryForm) -> Self {
        Self {
            is_new: form.is_new_post.as_deref().map(str::trim) == Some("1"),
            slug: form.slug,
            title: form.title,
            content: form.content,
            author: form.author,
            is_page: parse_form_bool(form.is_page.as_deref()),
            is_hidden: is_checked(form.hidden.as_deref()),
            allow_comments: is_checked(form.allow_comments.as_deref()),
        }
    }
}

pub(super) async fn admin_posts(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<AdminListQuery>,
) -> Response {
    list_entries(&state, &headers, query, false).await
}

pub(super) async fn admin_pages(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<AdminListQuery>,
) -> Response {
    list_entries(&state, &headers, query, true).await
}

async fn list_entries(
    state: &AdminState,
    headers: &HeaderMap,
    query: AdminListQuery,
    is_pages: bool,
) -> Response {
    let page = query
        .page
        .as_deref()
        .and_then(|raw| raw.trim().parse::<PageNumber>().ok())
        .unwrap_or(PageNumber::FIRST);

    let archive = match state
        .site
        .queries()
        .query_page(is_pages, page, state.entries_per_page.get(), true)
        .await
    {
        Ok(archive) => archive,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let (title, page_id, base) = if is_pages {
        ("Pages", "admin-pages", PAGES_PATH)
    } else {
        ("Posts", "admin-posts", POSTS_PATH)
    };
    let origin = request_origin(headers);
    let mut view = state.site.chrome(&origin, title, page_id);
    view.entries = state.site.entry_contexts(&archive.items);
    view.previous_url = archive.page.previous().map(|p| list_url(base, p));
    view.next_url = if archive.has_more {
        archive.page.next().map(|p| list_url(base, p))
    } else {
        None
    };

    render_template_response(
        AdminEntriesTemplate {
            view,
            is_pages,
            added: blank_to_none_opt(query.added),
        },
        StatusCode::OK,
    )
}

fn list_url(base: &str, page: PageNumber) -> String {
    if page.is_first() {
        base.to_string()
    } else {
        with_query(base, "page", &page.get().to_string())
    }
}

pub(super) async fn admin_edit(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<AdminEditQuery>,
) -> Response {
    let form = match blank_to_none_opt(query.slug) {
        Some(slug) => match state.site.queries().query_single(&slug).await {
            Ok(entry) => EditFormView::from_entry(&entry),
            Err(err) => return HttpError::from(err).into_response(),
        },
        None => EditFormView::blank(parse_form_bool(query.is_page.as_deref())),
    };

    let title = if form.is_new {
        "New entry".to_string()
    } else {
        form.title.clone()
    };
    let origin = request_origin(&headers);
    let view = state.site.chrome(&origin, &title, "admin-edit");

    render_template_response(AdminEditTemplate { view, form }, StatusCode::OK)
}

pub(super) async fn admin_submit_entry(
    State(state): State<AdminState>,
    Form(form): Form<AdminEntryForm>,
) -> Response {
    match state.content.submit_entry(form.into()).await {
        Ok(entry) => {
            let base = if entry.is_page { PAGES_PATH } else { POSTS_PATH };
            redirect_found(&with_query(base, "added", &entry.slug))
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_maps_flags_onto_submission() {
        let submission = EntrySubmission::from(AdminEntryForm {
            is_new_post: Some("1".into()),
            slug: "hello".into(),
            title: "Hello".into(),
            content: "Body".into(),
            author: String::new(),
            is_page: Some("true".into()),
            hidden: Some("on".into()),
            allow_comments: None,
        });

        assert!(submission.is_new);
        assert!(submission.is_page);
        assert!(submission.is_hidden);
        assert!(!submission.allow_comments);
    }

    #[test]
    fn missing_marker_means_edit() {
        let submission = EntrySubmission::from(AdminEntryForm::default());
        assert!(!submission.is_new);
        assert!(!submission.is_page);
    }

    #[test]
    fn first_list_page_has_no_query() {
        assert_eq!(list_url(POSTS_PATH, PageNumber::FIRST), "/admin");
        let third = PageNumber::new(3).expect("non-zero");
        assert_eq!(list_url(PAGES_PATH, third), "/admin/pages?page=3");
    }
}
