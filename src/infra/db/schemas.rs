use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateSchemaParams, RepoError, SchemaListWindow, SchemasRepo, SchemasWriteRepo,
    },
    domain::entities::SchemaRecord,
};

use super::{PostgresRepositories, util::decode_member_ids, util::map_sqlx_error};

const SCHEMA_COLUMNS: &str = "id, title, definition, card_ids, created_at";

#[derive(sqlx::FromRow)]
struct SchemaRow {
    id: Uuid,
    title: String,
    definition: Json<Value>,
    card_ids: Json<Value>,
    created_at: OffsetDateTime,
}

impl TryFrom<SchemaRow> for SchemaRecord {
    type Error = RepoError;

    fn try_from(row: SchemaRow) -> Result<Self, Self::Error> {
        let member_ids = decode_member_ids(row.id, row.card_ids.0)?;
        Ok(Self {
            id: row.id,
            title: row.title,
            definition: row.definition.0,
            member_ids,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl SchemasRepo for PostgresRepositories {
    async fn find_schema(&self, id: Uuid) -> Result<Option<SchemaRecord>, RepoError> {
        let row = sqlx::query_as::<_, SchemaRow>(&format!(
            "SELECT {SCHEMA_COLUMNS} FROM card_schemas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SchemaRecord::try_from).transpose()
    }

    async fn list_schemas(
        &self,
        window: SchemaListWindow,
    ) -> Result<Vec<SchemaRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(SCHEMA_COLUMNS);
        qb.push(" FROM card_schemas ORDER BY created_at, id");

        if let Some(limit) = window.limit {
            qb.push(" LIMIT ");
            qb.push_bind(to_i64(limit, "limit")?);
            qb.push(" OFFSET ");
            qb.push_bind(to_i64(window.offset, "offset")?);
        }

        let rows = qb
            .build_query_as::<SchemaRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(SchemaRecord::try_from).collect()
    }
}

#[async_trait]
impl SchemasWriteRepo for PostgresRepositories {
    async fn create_schema(&self, params: CreateSchemaParams) -> Result<SchemaRecord, RepoError> {
        let CreateSchemaParams { title, definition } = params;

        let row = sqlx::query_as::<_, SchemaRow>(&format!(
            r#"
            INSERT INTO card_schemas (id, title, definition, card_ids, created_at)
            VALUES ($1, $2, $3, '[]'::jsonb, clock_timestamp())
            RETURNING {SCHEMA_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(Json(definition))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        SchemaRecord::try_from(row)
    }

    async fn delete_schema(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM card_schemas WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if locked.is_none() {
            return Err(RepoError::NotFound);
        }

        let cards = sqlx::query("DELETE FROM cards WHERE schema_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        sqlx::query("DELETE FROM card_schemas WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(cards)
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64, RepoError> {
    i64::try_from(value).map_err(|_| RepoError::InvalidInput {
        message: format!("`{field}` exceeds supported range"),
    })
}
