use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{content::ContentError, query::QueryError, repos::RepoError, site::SiteError},
    domain::error::DomainError,
    infra::error::InfraError,
};

pub const NOT_FOUND_MESSAGE: &str = "I looked for an entry, but it was not there.";

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// An HTTP failure carrying a public message and an internal report.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

fn repo_status(error: &RepoError) -> StatusCode {
    match error {
        RepoError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        RepoError::Duplicate { .. } | RepoError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        RepoError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn repo_message(error: &RepoError) -> &'static str {
    match error {
        RepoError::Timeout => "Service temporarily unavailable",
        RepoError::Duplicate { .. } | RepoError::InvalidInput { .. } => {
            "Request could not be processed"
        }
        RepoError::Persistence(_) => "Internal server error",
    }
}

impl From<QueryError> for HttpError {
    fn from(error: QueryError) -> Self {
        const SOURCE: &str = "application::error::query_error_to_http_error";
        match &error {
            QueryError::NotFound { .. } | QueryError::EmptySlug => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                NOT_FOUND_MESSAGE,
                &error,
            ),
            QueryError::Storage(inner) => {
                HttpError::from_error(SOURCE, repo_status(inner), repo_message(inner), &error)
            }
        }
    }
}

impl From<SiteError> for HttpError {
    fn from(error: SiteError) -> Self {
        const SOURCE: &str = "application::error::site_error_to_http_error";
        match error {
            SiteError::Query(inner) => inner.into(),
            SiteError::PageOutOfRange { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                NOT_FOUND_MESSAGE,
                &error,
            ),
            SiteError::Template(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to render",
                &error,
            ),
        }
    }
}

impl From<ContentError> for HttpError {
    fn from(error: ContentError) -> Self {
        const SOURCE: &str = "application::error::content_error_to_http_error";
        match &error {
            ContentError::Domain(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            ContentError::Query(QueryError::Storage(inner)) | ContentError::Repo(inner) => {
                HttpError::from_error(SOURCE, repo_status(inner), repo_message(inner), &error)
            }
            ContentError::Query(_) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                NOT_FOUND_MESSAGE,
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(_) => StatusCode::BAD_REQUEST,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(_) => "Request could not be processed",
            AppError::Infra(InfraError::Database { .. }) => "Service temporarily unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
