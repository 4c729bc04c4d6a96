use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::pagination::{PaginationError, schema_list_window};
use crate::application::repos::{CreateSchemaParams, RepoError, SchemasRepo, SchemasWriteRepo};
use crate::domain::entities::SchemaRecord;
use crate::domain::schema::{CompiledSchema, SchemaDocumentError, normalize_definition};

#[derive(Debug, Error)]
pub enum SchemaServiceError {
    #[error("`{0}` cannot be empty")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Document(#[from] SchemaDocumentError),
    #[error("schema not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AddSchemaCommand {
    pub title: String,
    pub definition: Value,
}

#[derive(Clone)]
pub struct SchemaService {
    reader: Arc<dyn SchemasRepo>,
    writer: Arc<dyn SchemasWriteRepo>,
}

impl SchemaService {
    pub fn new(reader: Arc<dyn SchemasRepo>, writer: Arc<dyn SchemasWriteRepo>) -> Self {
        Self { reader, writer }
    }

    /// Compile and persist a new schema with an empty member index.
    #[instrument(skip_all, fields(title = %command.title))]
    pub async fn add_schema(
        &self,
        command: AddSchemaCommand,
    ) -> Result<SchemaRecord, SchemaServiceError> {
        let title = command.title.trim();
        if title.is_empty() {
            return Err(SchemaServiceError::ConstraintViolation("title"));
        }

        let definition = normalize_definition(&command.definition)?;
        CompiledSchema::compile(&definition)?;

        let schema = self
            .writer
            .create_schema(CreateSchemaParams {
                title: title.to_string(),
                definition,
            })
            .await?;

        info!(schema_id = %schema.id, "schema created");
        Ok(schema)
    }

    pub async fn get_schema(&self, id: Uuid) -> Result<SchemaRecord, SchemaServiceError> {
        self.reader
            .find_schema(id)
            .await?
            .ok_or(SchemaServiceError::NotFound)
    }

    /// List schemas in insertion order. A non-positive `limit` lists all of
    /// them and ignores `offset`.
    pub async fn get_schemas(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SchemaRecord>, SchemaServiceError> {
        let window = schema_list_window(limit, offset)?;
        self.reader
            .list_schemas(window)
            .await
            .map_err(SchemaServiceError::from)
    }

    /// Delete a schema and every card that belongs to it.
    #[instrument(skip(self))]
    pub async fn delete_schema(&self, id: Uuid) -> Result<u64, SchemaServiceError> {
        let removed = self.writer.delete_schema(id).await.map_err(|err| match err {
            RepoError::NotFound => SchemaServiceError::NotFound,
            other => SchemaServiceError::Repo(other),
        })?;

        info!(schema_id = %id, cards_removed = removed, "schema deleted");
        Ok(removed)
    }

    /// Check `content` against `definition` without touching storage.
    pub fn validate_content(content: &Value, definition: &Value) -> Result<(), SchemaServiceError> {
        crate::domain::schema::validate_content(content, definition)?;
        Ok(())
    }
}
