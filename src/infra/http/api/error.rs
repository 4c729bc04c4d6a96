use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tessera_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::error::ErrorReport;

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const SCHEMA_COMPILE: &str = "schema_compile_error";
    pub const VALIDATION: &str = "validation_error";
    pub const IO: &str = "io_error";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    violations: Vec<String>,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            violations: Vec::new(),
            detail: None,
        }
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    /// A 500 whose cause is logged but never sent to the client.
    pub fn internal(code: &'static str, message: &'static str, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message, None)
        }
    }

    pub fn with_violations(mut self, violations: Vec<String>) -> Self {
        self.violations = violations;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match (self.detail, self.hint.as_deref()) {
            (Some(detail), _) => detail,
            (None, Some(hint)) => hint.to_string(),
            (None, None) => self.message.to_string(),
        };
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
                violations: self.violations,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {detail}", self.code),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn internal_errors_keep_the_cause_out_of_the_body() {
        let response = ApiError::internal(codes::REPO, "Could not add card", "pool closed")
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .cloned()
            .expect("report");
        assert_eq!(report.messages, vec!["repo_error: pool closed".to_string()]);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: ApiErrorBody = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body.error.message, "Could not add card");
        assert!(body.error.hint.is_none());
    }
}
