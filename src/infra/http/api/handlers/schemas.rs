//! Schema handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tessera_api_types::{AddSchemaRequest, IdResponse, SchemaListQuery, SchemaListResponse};
use uuid::Uuid;

use crate::application::schemas::AddSchemaCommand;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

use super::{schema_to_api, schema_to_response};

pub async fn add_schema(
    State(state): State<ApiState>,
    Json(payload): Json<AddSchemaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schema = state
        .schemas
        .add_schema(AddSchemaCommand {
            title: payload.title,
            definition: payload.definition,
        })
        .await
        .map_err(|err| schema_to_api(err, "Could not add schema"))?;

    Ok((StatusCode::CREATED, Json(IdResponse { id: schema.id })))
}

pub async fn get_schema(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let schema = state
        .schemas
        .get_schema(id)
        .await
        .map_err(|err| schema_to_api(err, "Could not load schema"))?;

    Ok(Json(schema_to_response(schema)))
}

pub async fn list_schemas(
    State(state): State<ApiState>,
    Query(query): Query<SchemaListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let schemas = state
        .schemas
        .get_schemas(query.limit, query.offset)
        .await
        .map_err(|err| schema_to_api(err, "Could not list schemas"))?;

    Ok(Json(SchemaListResponse {
        schemas: schemas.into_iter().map(schema_to_response).collect(),
    }))
}

pub async fn delete_schema(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .schemas
        .delete_schema(id)
        .await
        .map_err(|err| schema_to_api(err, "Could not delete schema"))?;

    Ok(Json(IdResponse { id }))
}
