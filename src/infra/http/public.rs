use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, HOST},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;

use crate::{
    application::{
        error::{ErrorReport, HttpError, NOT_FOUND_MESSAGE},
        site::{FEED_PATH, RequestOrigin, SiteError, SiteService},
    },
    presentation::views::render_not_found_response,
};

use super::middleware::{log_responses, set_request_context};

const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";

#[derive(Clone)]
pub struct HttpState {
    pub site: SiteService,
    /// Sent with every successful public page; `None` sends nothing.
    pub cache_control: Option<HeaderValue>,
}

impl HttpState {
    pub fn new(site: SiteService) -> Self {
        let configured = site.settings().cache_control_header.trim();
        let cache_control = if configured.is_empty() {
            None
        } else {
            HeaderValue::from_str(configured).ok()
        };
        Self {
            site,
            cache_control,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(public_page))
        .route(FEED_PATH, get(feed))
        .fallback(fallback_page)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn public_page(
    State(state): State<HttpState>,
    headers: HeaderMap,
    request: Request<Body>,
) -> Response {
    let origin = request_origin(&headers);
    let path = request.uri().path().to_string();

    match state.site.render_path(&path, &origin).await {
        Ok(body) => body_response(&state, body, HTML_CONTENT_TYPE),
        Err(err) => site_error_response(&state, &origin, err),
    }
}

async fn fallback_page(
    State(state): State<HttpState>,
    headers: HeaderMap,
    request: Request<Body>,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
        ErrorReport::from_message(
            "infra::http::public::fallback_page",
            StatusCode::METHOD_NOT_ALLOWED,
            format!("{} is not served on public paths", request.method()),
        )
        .attach(&mut response);
        return response;
    }
    public_page(State(state), headers, request).await
}

async fn feed(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let origin = request_origin(&headers);
    match state.site.render_feed(&origin).await {
        Ok(body) => body_response(&state, body, ATOM_CONTENT_TYPE),
        Err(err) => site_error_response(&state, &origin, err),
    }
}

fn body_response(state: &HttpState, body: Bytes, content_type: &'static str) -> Response {
    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(content_type))],
        body,
    )
        .into_response();
    if let Some(value) = state.cache_control.clone() {
        response.headers_mut().insert(CACHE_CONTROL, value);
    }
    response
}

fn site_error_response(state: &HttpState, origin: &RequestOrigin, err: SiteError) -> Response {
    if err.is_not_found() {
        let view = state.site.chrome(origin, "Not found", "error");
        let mut response = render_not_found_response(view, NOT_FOUND_MESSAGE);
        if response.status() == StatusCode::NOT_FOUND {
            ErrorReport::from_error(
                "infra::http::public::site_error_response",
                StatusCode::NOT_FOUND,
                &err,
            )
            .attach(&mut response);
        }
        return response;
    }
    HttpError::from(err).into_response()
}

/// Scheme from `X-Forwarded-Proto` (default `http`), host from the `Host` header.
pub(crate) fn request_origin(headers: &HeaderMap) -> RequestOrigin {
    let scheme = headers
        .get(FORWARDED_PROTO_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    RequestOrigin::new(scheme, host)
}
