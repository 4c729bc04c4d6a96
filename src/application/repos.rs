//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CardRecord, SchemaRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("stored data is corrupt: {message}")]
    Corrupt { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateSchemaParams {
    pub title: String,
    pub definition: Value,
}

#[derive(Debug, Clone)]
pub struct CreateCardParams {
    pub schema_id: Uuid,
    pub image_location: Option<String>,
    pub content: Value,
}

/// Partial card update. `None` leaves the column untouched; `content` and
/// `schema_id` are always supplied together.
#[derive(Debug, Clone, Default)]
pub struct UpdateCardParams {
    pub id: Uuid,
    pub image_location: Option<String>,
    pub content: Option<(Uuid, Value)>,
}

/// Window over the schema listing. `limit == None` means unbounded, in which
/// case the offset is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaListWindow {
    pub limit: Option<u64>,
    pub offset: u64,
}

#[async_trait]
pub trait SchemasRepo: Send + Sync {
    async fn find_schema(&self, id: Uuid) -> Result<Option<SchemaRecord>, RepoError>;

    /// Schemas in insertion order.
    async fn list_schemas(&self, window: SchemaListWindow)
    -> Result<Vec<SchemaRecord>, RepoError>;
}

#[async_trait]
pub trait SchemasWriteRepo: Send + Sync {
    async fn create_schema(&self, params: CreateSchemaParams) -> Result<SchemaRecord, RepoError>;

    /// Delete a schema together with its member cards, returning how many
    /// cards went with it. `RepoError::NotFound` when the schema is absent.
    async fn delete_schema(&self, id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait CardsRepo: Send + Sync {
    async fn find_card(&self, id: Uuid) -> Result<Option<CardRecord>, RepoError>;

    /// Fetch the cards with the given ids. Missing ids are skipped and the
    /// order of the result is unspecified.
    async fn find_cards(&self, ids: &[Uuid]) -> Result<Vec<CardRecord>, RepoError>;
}

/// Card writes. Every method keeps the owning schema's member index in step
/// with the card table inside a single transaction.
#[async_trait]
pub trait CardsWriteRepo: Send + Sync {
    /// Insert a card and append its id to the schema index.
    /// `RepoError::NotFound` when the schema no longer exists.
    async fn insert_card(&self, params: CreateCardParams) -> Result<CardRecord, RepoError>;

    /// Apply a partial update, moving the id between schema indexes when the
    /// card changes schema.
    async fn update_card(&self, params: UpdateCardParams) -> Result<CardRecord, RepoError>;

    /// Delete a card and drop its id from the schema index.
    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError>;
}
