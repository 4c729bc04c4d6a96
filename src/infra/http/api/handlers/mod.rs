//! API handlers organized by resource type.
//!
//! Error conversions shared by the schema and card handlers live here.

mod cards;
mod schemas;

pub use cards::*;
pub use schemas::*;

use axum::http::StatusCode;
use tessera_api_types::{CardResponse, SchemaResponse};

use crate::application::cards::CardServiceError;
use crate::application::repos::RepoError;
use crate::application::schemas::SchemaServiceError;
use crate::domain::entities::{CardRecord, SchemaRecord};
use crate::domain::schema::SchemaDocumentError;

use super::error::{ApiError, codes};

pub(crate) fn schema_to_response(schema: SchemaRecord) -> SchemaResponse {
    SchemaResponse {
        id: schema.id,
        title: schema.title,
        definition: schema.definition,
        member_ids: schema.member_ids,
    }
}

pub(crate) fn card_to_response(card: CardRecord) -> CardResponse {
    CardResponse {
        id: card.id,
        schema_id: card.schema_id,
        image: card.image_location,
        content: card.content,
    }
}

/// Map a repository failure on a write. `message` is what the client sees
/// when the cause is internal.
pub(crate) fn repo_to_api(err: RepoError, message: &'static str) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        other @ (RepoError::Persistence(_) | RepoError::Corrupt { .. }) => {
            ApiError::internal(codes::REPO, message, other.to_string())
        }
    }
}

pub(crate) fn document_to_api(err: SchemaDocumentError) -> ApiError {
    match err {
        SchemaDocumentError::EmptyDefinition => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid schema",
            Some(err.to_string()),
        ),
        SchemaDocumentError::Compile(_) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::SCHEMA_COMPILE,
            "Schema does not compile",
            Some(err.to_string()),
        ),
        SchemaDocumentError::MalformedContent(_) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            "Content is not valid JSON",
            Some(err.to_string()),
        ),
        SchemaDocumentError::Violations { violations } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            "Content does not match the schema",
            Some(format!("{} violations", violations.len())),
        )
        .with_violations(violations),
    }
}

pub(crate) fn schema_to_api(err: SchemaServiceError, message: &'static str) -> ApiError {
    match err {
        SchemaServiceError::ConstraintViolation(field) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid schema",
            Some(format!("`{field}` cannot be empty")),
        ),
        SchemaServiceError::Pagination(err) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid listing window",
            Some(err.to_string()),
        ),
        SchemaServiceError::Document(err) => document_to_api(err),
        SchemaServiceError::NotFound => ApiError::not_found("schema not found"),
        SchemaServiceError::Repo(err) => repo_to_api(err, message),
    }
}

pub(crate) fn card_to_api(err: CardServiceError, message: &'static str) -> ApiError {
    match err {
        CardServiceError::NotFound => ApiError::not_found("card not found"),
        CardServiceError::SchemaNotFound => ApiError::not_found("schema not found"),
        CardServiceError::PageOutOfRange => {
            ApiError::not_found("no cards available for this page")
        }
        CardServiceError::Pagination(err) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid page",
            Some(err.to_string()),
        ),
        CardServiceError::Document(err) => document_to_api(err),
        err @ (CardServiceError::Image { .. } | CardServiceError::ImageIsDirectory { .. }) => {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::IO,
                "Image is not usable",
                Some(err.to_string()),
            )
        }
        CardServiceError::Repo(err) => repo_to_api(err, message),
    }
}
