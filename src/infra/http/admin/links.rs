use axum::{
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    application::{content::LinkSubmission, error::HttpError},
    infra::http::{
        admin::{
            AdminState,
            shared::{blank_to_none_opt, redirect_found, with_query},
        },
        request_origin,
    },
    presentation::{
        admin::views::AdminLinksTemplate,
        views::{LinkView, render_template_response},
    },
};

const LINKS_PATH: &str = "/admin/links";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminLinksQuery {
    added: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminLinkForm {
    new_url: String,
    new_title: String,
    new_order: String,
}

impl From<AdminLinkForm> for LinkSubmission {
    fn from(form: AdminLinkForm) -> Self {
        Self {
            url: form.new_url,
            title: form.new_title,
            order: form.new_order,
        }
    }
}

pub(super) async fn admin_links(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<AdminLinksQuery>,
) -> Response {
    let links = match state.site.queries().query_links().await {
        Ok(links) => links,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let origin = request_origin(&headers);
    let mut view = state.site.chrome(&origin, "Links", "admin-links");
    view.links = links.iter().map(LinkView::from).collect();

    render_template_response(
        AdminLinksTemplate {
            view,
            added: blank_to_none_opt(query.added),
        },
        StatusCode::OK,
    )
}

pub(super) async fn admin_submit_link(
    State(state): State<AdminState>,
    Form(form): Form<AdminLinkForm>,
) -> Response {
    match state.content.submit_link(form.into()).await {
        Ok(link) => redirect_found(&with_query(LINKS_PATH, "added", &link.url)),
        Err(err) => HttpError::from(err).into_response(),
    }
}
