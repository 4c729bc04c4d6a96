//! Card handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tessera_api_types::{
    AddCardRequest, CardListQuery, CardListResponse, ChangeCardRequest, IdResponse,
};
use uuid::Uuid;

use crate::application::cards::{AddCardCommand, ChangeCardCommand};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

use super::{card_to_api, card_to_response};

pub async fn add_card(
    State(state): State<ApiState>,
    Json(payload): Json<AddCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .cards
        .add_card(AddCardCommand {
            image: payload.image,
            schema_id: payload.schema_id,
            content: payload.content,
        })
        .await
        .map_err(|err| card_to_api(err, "Could not add card"))?;

    Ok((StatusCode::CREATED, Json(IdResponse { id: card.id })))
}

pub async fn list_cards(
    State(state): State<ApiState>,
    Path(schema_id): Path<Uuid>,
    Query(query): Query<CardListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = state
        .cards
        .get_cards(schema_id, query.limit, query.page)
        .await
        .map_err(|err| card_to_api(err, "Could not load cards"))?;

    Ok(Json(CardListResponse {
        cards: cards.into_iter().map(card_to_response).collect(),
    }))
}

pub async fn change_card(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .cards
        .change_card(ChangeCardCommand {
            id,
            image: payload.image,
            content: payload.content,
            schema_id: payload.schema_id,
        })
        .await
        .map_err(|err| card_to_api(err, "Could not change card"))?;

    Ok(Json(IdResponse { id: card.id }))
}

pub async fn delete_card(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .cards
        .delete_card(id)
        .await
        .map_err(|err| card_to_api(err, "Could not delete card"))?;

    Ok(Json(IdResponse { id }))
}
