use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{cards::CardServiceError, schemas::SchemaServiceError},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
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
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<SchemaServiceError> for HttpError {
    fn from(error: SchemaServiceError) -> Self {
        const SOURCE: &str = "application::error::schema_error_to_http";
        match error {
            SchemaServiceError::NotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Schema not found",
                "schema does not exist",
            ),
            SchemaServiceError::Pagination(err) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid listing window",
                &err,
            ),
            other => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not load schemas",
                &other,
            ),
        }
    }
}

impl From<CardServiceError> for HttpError {
    fn from(error: CardServiceError) -> Self {
        const SOURCE: &str = "application::error::card_error_to_http";
        match error {
            CardServiceError::SchemaNotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Schema not found",
                "schema does not exist",
            ),
            CardServiceError::PageOutOfRange => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Page not found",
                "page starts past the last card",
            ),
            CardServiceError::Pagination(err) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid page",
                &err,
            ),
            other => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not load cards",
                &other,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
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
            AppError::Infra(InfraError::Database { .. } | InfraError::Migration(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(
                InfraError::Configuration { .. }
                | InfraError::Settings(_)
                | InfraError::Telemetry(_)
                | InfraError::Io(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Infra(InfraError::Database { .. }) => "Service temporarily unavailable",
            AppError::Infra(InfraError::Migration(_)) => "Database schema is out of date",
            AppError::Infra(InfraError::Configuration { .. } | InfraError::Settings(_)) => {
                "Service misconfigured"
            }
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "Listener could not start",
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
