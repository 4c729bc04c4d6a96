use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, Transaction, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CardsRepo, CardsWriteRepo, CreateCardParams, RepoError, UpdateCardParams,
    },
    domain::entities::CardRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const CARD_COLUMNS: &str = "id, schema_id, image_location, content, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CardRow {
    id: Uuid,
    schema_id: Uuid,
    image_location: Option<String>,
    content: Json<Value>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CardRow> for CardRecord {
    fn from(row: CardRow) -> Self {
        Self {
            id: row.id,
            schema_id: row.schema_id,
            image_location: row.image_location,
            content: row.content.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CardsRepo for PostgresRepositories {
    async fn find_card(&self, id: Uuid) -> Result<Option<CardRecord>, RepoError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CardRecord::from))
    }

    async fn find_cards(&self, ids: &[Uuid]) -> Result<Vec<CardRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CardRecord::from).collect())
    }
}

#[async_trait]
impl CardsWriteRepo for PostgresRepositories {
    async fn insert_card(&self, params: CreateCardParams) -> Result<CardRecord, RepoError> {
        let CreateCardParams {
            schema_id,
            image_location,
            content,
        } = params;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        if !lock_schemas(&mut tx, &[schema_id]).await?.contains(&schema_id) {
            return Err(RepoError::NotFound);
        }

        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            INSERT INTO cards (id, schema_id, image_location, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(schema_id)
        .bind(image_location)
        .bind(Json(content))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        append_member(&mut tx, schema_id, id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_card(&self, params: UpdateCardParams) -> Result<CardRecord, RepoError> {
        let UpdateCardParams {
            id,
            image_location,
            content,
        } = params;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let current = sqlx::query_scalar::<_, Uuid>(
            "SELECT schema_id FROM cards WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let (schema_id, content) = match content {
            Some((target, content)) => (Some(target), Some(Json(content))),
            None => (None, None),
        };

        if let Some(target) = schema_id.filter(|target| *target != current) {
            let locked = lock_schemas(&mut tx, &[current, target]).await?;
            if !locked.contains(&target) {
                return Err(RepoError::InvalidInput {
                    message: format!("schema {target} no longer exists"),
                });
            }
            remove_member(&mut tx, current, id).await?;
            append_member(&mut tx, target, id).await?;
        }

        let row = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            UPDATE cards
            SET image_location = COALESCE($2, image_location),
                schema_id = COALESCE($3, schema_id),
                content = COALESCE($4, content),
                updated_at = now()
            WHERE id = $1
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(image_location)
        .bind(schema_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let schema_id =
            sqlx::query_scalar::<_, Uuid>("DELETE FROM cards WHERE id = $1 RETURNING schema_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .ok_or(RepoError::NotFound)?;

        remove_member(&mut tx, schema_id, id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }
}

/// Row-lock the given schemas in id order and return the ids that exist.
async fn lock_schemas(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[Uuid],
) -> Result<Vec<Uuid>, RepoError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM card_schemas WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(map_sqlx_error)
}

async fn append_member(
    tx: &mut Transaction<'_, Postgres>,
    schema_id: Uuid,
    card_id: Uuid,
) -> Result<(), RepoError> {
    sqlx::query(
        "UPDATE card_schemas SET card_ids = card_ids || jsonb_build_array($2::text) WHERE id = $1",
    )
    .bind(schema_id)
    .bind(card_id)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn remove_member(
    tx: &mut Transaction<'_, Postgres>,
    schema_id: Uuid,
    card_id: Uuid,
) -> Result<(), RepoError> {
    sqlx::query("UPDATE card_schemas SET card_ids = card_ids - $2::text WHERE id = $1")
        .bind(schema_id)
        .bind(card_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}
