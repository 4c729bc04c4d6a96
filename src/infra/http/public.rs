use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::get,
};
use tessera_api_types::{CardListQuery, CardListResponse, SchemaListQuery, SchemaListResponse};
use uuid::Uuid;

use crate::{
    application::{
        cards::{CardService, CardServiceError},
        error::HttpError,
        schemas::{SchemaService, SchemaServiceError},
    },
    cache::{CacheState, response_cache_layer},
};

use super::{
    HealthProbe, RouterState, db_health_response,
    api::handlers::{card_to_response, schema_to_response},
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct PublicState {
    pub schemas: Arc<SchemaService>,
    pub cards: Arc<CardService>,
    pub health: Arc<dyn HealthProbe>,
    pub cache: CacheState,
}

/// Public read surface. Product routes sit behind the response cache;
/// `/health` always reaches the database.
pub fn build_router(state: RouterState) -> Router {
    let cached_routes = Router::new()
        .route("/products", get(product_index))
        .route("/products/{schema_id}", get(product_cards))
        .layer(middleware::from_fn_with_state(
            state.public.cache.clone(),
            response_cache_layer,
        ));

    let uncached_routes = Router::new().route("/health", get(public_health));

    cached_routes
        .merge(uncached_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn product_index(
    State(state): State<PublicState>,
    Query(query): Query<SchemaListQuery>,
) -> Result<Json<SchemaListResponse>, HttpError> {
    let schemas = state
        .schemas
        .get_schemas(query.limit, query.offset)
        .await
        .map_err(|err| match err {
            SchemaServiceError::Repo(repo) => repo_error_to_http(SOURCE, repo),
            other => HttpError::from(other),
        })?;

    Ok(Json(SchemaListResponse {
        schemas: schemas.into_iter().map(schema_to_response).collect(),
    }))
}

async fn product_cards(
    State(state): State<PublicState>,
    Path(schema_id): Path<Uuid>,
    Query(query): Query<CardListQuery>,
) -> Result<Json<CardListResponse>, HttpError> {
    let cards = state
        .cards
        .get_cards(schema_id, query.limit, query.page)
        .await
        .map_err(|err| match err {
            CardServiceError::Repo(repo) => repo_error_to_http(SOURCE, repo),
            other => HttpError::from(other),
        })?;

    Ok(Json(CardListResponse {
        cards: cards.into_iter().map(card_to_response).collect(),
    }))
}

async fn public_health(State(state): State<PublicState>) -> Response {
    db_health_response(state.health.check().await)
}
