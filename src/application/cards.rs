use std::io;
use std::num::NonZeroU32;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::pagination::{CardPage, PaginationError, order_by_window};
use crate::application::repos::{
    CardsRepo, CardsWriteRepo, CreateCardParams, RepoError, SchemasRepo, UpdateCardParams,
};
use crate::domain::entities::{CardRecord, SchemaRecord};
use crate::domain::schema::{CompiledSchema, SchemaDocumentError, normalize_content};

#[derive(Debug, Error)]
pub enum CardServiceError {
    #[error("card not found")]
    NotFound,
    #[error("schema not found")]
    SchemaNotFound,
    #[error("no cards available for this page")]
    PageOutOfRange,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Document(#[from] SchemaDocumentError),
    #[error("image `{path}` is not readable")]
    Image {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("image `{path}` is a directory")]
    ImageIsDirectory { path: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AddCardCommand {
    pub image: Option<String>,
    pub schema_id: Uuid,
    pub content: Value,
}

/// Partial card update. Empty fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct ChangeCardCommand {
    pub id: Uuid,
    pub image: Option<String>,
    pub content: Option<Value>,
    pub schema_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CardService {
    schemas: Arc<dyn SchemasRepo>,
    reader: Arc<dyn CardsRepo>,
    writer: Arc<dyn CardsWriteRepo>,
    default_page_limit: NonZeroU32,
}

impl CardService {
    pub fn new(
        schemas: Arc<dyn SchemasRepo>,
        reader: Arc<dyn CardsRepo>,
        writer: Arc<dyn CardsWriteRepo>,
        default_page_limit: NonZeroU32,
    ) -> Self {
        Self {
            schemas,
            reader,
            writer,
            default_page_limit,
        }
    }

    /// Validate `content` against the named schema, then persist the card and
    /// append its id to the schema's member index as one unit.
    #[instrument(skip_all, fields(schema_id = %command.schema_id))]
    pub async fn add_card(&self, command: AddCardCommand) -> Result<CardRecord, CardServiceError> {
        let AddCardCommand {
            image,
            schema_id,
            content,
        } = command;

        let schema = self.load_schema(schema_id).await?;
        let content = checked_content(&schema, &content)?;

        let card = self
            .writer
            .insert_card(CreateCardParams {
                schema_id,
                image_location: non_empty(image),
                content,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => CardServiceError::SchemaNotFound,
                other => CardServiceError::Repo(other),
            })?;

        info!(card_id = %card.id, "card created");
        Ok(card)
    }

    /// Cards of one schema, in member index order.
    #[instrument(skip(self))]
    pub async fn get_cards(
        &self,
        schema_id: Uuid,
        limit: i64,
        page: i64,
    ) -> Result<Vec<CardRecord>, CardServiceError> {
        let page = CardPage::resolve(limit, page, self.default_page_limit)?;
        let schema = self.load_schema(schema_id).await?;

        let window = page
            .window(&schema.member_ids)
            .ok_or(CardServiceError::PageOutOfRange)?;

        let rows = self.reader.find_cards(window).await?;
        let (cards, missing) = order_by_window(window, rows);
        if !missing.is_empty() {
            warn!(
                schema_id = %schema_id,
                missing = missing.len(),
                ids = ?missing,
                "member index references cards that do not exist"
            );
        }

        Ok(cards)
    }

    #[instrument(skip_all, fields(card_id = %command.id))]
    pub async fn change_card(
        &self,
        command: ChangeCardCommand,
    ) -> Result<CardRecord, CardServiceError> {
        let ChangeCardCommand {
            id,
            image,
            content,
            schema_id,
        } = command;

        let existing = self
            .reader
            .find_card(id)
            .await?
            .ok_or(CardServiceError::NotFound)?;

        let image_location = match non_empty(image) {
            Some(path) => {
                ensure_image_file(&path).await?;
                Some(path)
            }
            None => None,
        };

        let content = match (content.filter(|value| !is_blank(value)), schema_id) {
            (Some(content), Some(schema_id)) => {
                let schema = self.load_schema(schema_id).await?;
                Some((schema_id, checked_content(&schema, &content)?))
            }
            (None, None) => None,
            (Some(_), None) => {
                debug!("`content` without `schema_id` left unchanged");
                None
            }
            (None, Some(_)) => {
                debug!("`schema_id` without `content` left unchanged");
                None
            }
        };

        if image_location.is_none() && content.is_none() {
            return Ok(existing);
        }

        let moved = content
            .as_ref()
            .is_some_and(|(schema_id, _)| *schema_id != existing.schema_id);

        let card = self
            .writer
            .update_card(UpdateCardParams {
                id,
                image_location,
                content,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => CardServiceError::NotFound,
                other => CardServiceError::Repo(other),
            })?;

        if moved {
            info!(from = %existing.schema_id, to = %card.schema_id, "card moved between schemas");
        }
        info!("card changed");
        Ok(card)
    }

    /// Delete a card and remove it from its schema's member index.
    #[instrument(skip(self))]
    pub async fn delete_card(&self, id: Uuid) -> Result<(), CardServiceError> {
        self.writer.delete_card(id).await.map_err(|err| match err {
            RepoError::NotFound => CardServiceError::NotFound,
            other => CardServiceError::Repo(other),
        })?;
        info!(card_id = %id, "card deleted");
        Ok(())
    }

    async fn load_schema(&self, id: Uuid) -> Result<SchemaRecord, CardServiceError> {
        self.schemas
            .find_schema(id)
            .await?
            .ok_or(CardServiceError::SchemaNotFound)
    }
}

fn checked_content(schema: &SchemaRecord, content: &Value) -> Result<Value, CardServiceError> {
    let content = normalize_content(content)?;
    CompiledSchema::compile(&schema.definition)?.validate(&content)?;
    Ok(content)
}

async fn ensure_image_file(path: &str) -> Result<(), CardServiceError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| CardServiceError::Image {
            path: path.to_string(),
            source,
        })?;

    if metadata.is_dir() {
        return Err(CardServiceError::ImageIsDirectory {
            path: path.to_string(),
        });
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}
