use axum::{
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use url::form_urlencoded::Serializer;

use crate::application::error::HttpError;

pub(super) fn blank_to_none_opt(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Boolean form value: `1`, `t`, `T` and the spellings of `true`.
pub(super) fn parse_form_bool(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True")
    )
}

/// A checkbox counts as checked whenever the browser sends it.
pub(super) fn is_checked(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// `base?key=value` with the value form-encoded.
pub(super) fn with_query(base: &str, key: &str, value: &str) -> String {
    let query = Serializer::new(String::new()).append_pair(key, value).finish();
    format!("{base}?{query}")
}

/// 302 Found to `location`.
pub(super) fn redirect_found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(err) => HttpError::from_error(
            "infra::http::admin::redirect_found",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}
