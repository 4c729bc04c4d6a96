pub mod error;
pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::cache::invalidate_on_write;
use crate::infra::http::RouterState;

/// Admin JSON API. Successful writes clear the public response cache.
pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let cache_state = state.api.cache.clone();

    Router::new()
        .route(
            "/api/v1/schemas",
            get(handlers::list_schemas).post(handlers::add_schema),
        )
        .route(
            "/api/v1/schemas/{id}",
            get(handlers::get_schema).delete(handlers::delete_schema),
        )
        .route("/api/v1/schemas/{id}/cards", get(handlers::list_cards))
        .route("/api/v1/cards", post(handlers::add_card))
        .route(
            "/api/v1/cards/{id}",
            put(handlers::change_card).delete(handlers::delete_card),
        )
        .layer(axum_middleware::from_fn_with_state(
            cache_state,
            invalidate_on_write,
        ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use tessera_api_types::{
        ApiErrorBody, CardListResponse, IdResponse, SchemaListResponse, SchemaResponse,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::application::test_support::InMemoryStore;
    use crate::infra::http::test_support::router_state;

    use super::*;

    struct Harness {
        store: Arc<InMemoryStore>,
        state: RouterState,
        router: Router,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::default());
        let state = router_state(store.clone());
        let router = build_api_router(state.clone()).with_state(state.clone());
        Harness {
            store,
            state,
            router,
        }
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn send<T: DeserializeOwned>(
        router: &Router,
        request: Request<Body>,
        expected: StatusCode,
    ) -> T {
        let response = router.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), expected);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn product_schema() -> Value {
        json!({
            "title": "Product",
            "definition": {
                "type": "object",
                "required": ["name", "price"],
                "properties": {
                    "name": { "type": "string" },
                    "price": { "type": "number" }
                }
            }
        })
    }

    async fn add_schema(harness: &Harness) -> Uuid {
        let created: IdResponse = send(
            &harness.router,
            json_request(Method::POST, "/api/v1/schemas", product_schema()),
            StatusCode::CREATED,
        )
        .await;
        created.id
    }

    async fn add_card(harness: &Harness, schema_id: Uuid, name: &str) -> Uuid {
        let created: IdResponse = send(
            &harness.router,
            json_request(
                Method::POST,
                "/api/v1/cards",
                json!({
                    "schema_id": schema_id,
                    "content": { "name": name, "price": 42 }
                }),
            ),
            StatusCode::CREATED,
        )
        .await;
        created.id
    }

    #[tokio::test]
    async fn product_scenario_round_trips_through_the_api() {
        let harness = harness();
        let schema_id = add_schema(&harness).await;
        let card_id = add_card(&harness, schema_id, "Chair").await;

        let schema: SchemaResponse = send(
            &harness.router,
            empty_request(Method::GET, &format!("/api/v1/schemas/{schema_id}")),
            StatusCode::OK,
        )
        .await;
        assert_eq!(schema.title, "Product");
        assert_eq!(schema.member_ids, vec![card_id]);

        let page: CardListResponse = send(
            &harness.router,
            empty_request(
                Method::GET,
                &format!("/api/v1/schemas/{schema_id}/cards?limit=1&page=0"),
            ),
            StatusCode::OK,
        )
        .await;
        assert_eq!(page.cards.len(), 1);
        assert_eq!(page.cards[0].content["name"], "Chair");

        let past_end: ApiErrorBody = send(
            &harness.router,
            empty_request(
                Method::GET,
                &format!("/api/v1/schemas/{schema_id}/cards?limit=1&page=1"),
            ),
            StatusCode::NOT_FOUND,
        )
        .await;
        assert_eq!(past_end.error.code, error::codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_content_reports_every_violation() {
        let harness = harness();
        let schema_id = add_schema(&harness).await;

        let body: ApiErrorBody = send(
            &harness.router,
            json_request(
                Method::POST,
                "/api/v1/cards",
                json!({ "schema_id": schema_id, "content": { "name": 5 } }),
            ),
            StatusCode::BAD_REQUEST,
        )
        .await;

        assert_eq!(body.error.code, error::codes::VALIDATION);
        assert_eq!(body.error.violations.len(), 2);
        assert_eq!(harness.store.card_count(), 0);
    }

    #[tokio::test]
    async fn uncompilable_schema_is_rejected() {
        let harness = harness();
        let body: ApiErrorBody = send(
            &harness.router,
            json_request(
                Method::POST,
                "/api/v1/schemas",
                json!({ "title": "Broken", "definition": { "type": 12 } }),
            ),
            StatusCode::BAD_REQUEST,
        )
        .await;

        assert_eq!(body.error.code, error::codes::SCHEMA_COMPILE);
        assert_eq!(harness.store.schema_count(), 0);

        let body: ApiErrorBody = send(
            &harness.router,
            json_request(
                Method::POST,
                "/api/v1/schemas",
                json!({ "title": "Anything", "definition": true }),
            ),
            StatusCode::BAD_REQUEST,
        )
        .await;
        assert_eq!(body.error.code, error::codes::SCHEMA_COMPILE);
        assert_eq!(harness.store.schema_count(), 0);
    }

    #[tokio::test]
    async fn zero_limit_with_page_is_bad_request() {
        let harness = harness();
        let schema_id = add_schema(&harness).await;
        add_card(&harness, schema_id, "Chair").await;

        let body: ApiErrorBody = send(
            &harness.router,
            empty_request(
                Method::GET,
                &format!("/api/v1/schemas/{schema_id}/cards?limit=0&page=5"),
            ),
            StatusCode::BAD_REQUEST,
        )
        .await;
        assert_eq!(body.error.code, error::codes::INVALID_INPUT);
        assert_eq!(
            body.error.hint.as_deref(),
            Some("card limit is 0 but page is not")
        );
    }

    #[tokio::test]
    async fn change_card_moves_it_between_schemas() {
        let harness = harness();
        let from = add_schema(&harness).await;
        let to = add_schema(&harness).await;
        let card_id = add_card(&harness, from, "Lamp").await;

        let changed: IdResponse = send(
            &harness.router,
            json_request(
                Method::PUT,
                &format!("/api/v1/cards/{card_id}"),
                json!({
                    "schema_id": to,
                    "content": { "name": "Desk lamp", "price": 30 }
                }),
            ),
            StatusCode::OK,
        )
        .await;
        assert_eq!(changed.id, card_id);
        assert!(harness.store.member_ids(from).is_empty());
        assert_eq!(harness.store.member_ids(to), vec![card_id]);

        let _: IdResponse = send(
            &harness.router,
            json_request(
                Method::PUT,
                &format!("/api/v1/cards/{card_id}"),
                json!({ "content": { "name": "x", "price": 1 } }),
            ),
            StatusCode::OK,
        )
        .await;
        let page: CardListResponse = send(
            &harness.router,
            empty_request(Method::GET, &format!("/api/v1/schemas/{to}/cards")),
            StatusCode::OK,
        )
        .await;
        assert_eq!(page.cards[0].content["name"], "Desk lamp");
    }

    #[tokio::test]
    async fn deletes_maintain_indexes() {
        let harness = harness();
        let schema_id = add_schema(&harness).await;
        let first = add_card(&harness, schema_id, "a").await;
        let second = add_card(&harness, schema_id, "b").await;

        let deleted: IdResponse = send(
            &harness.router,
            empty_request(Method::DELETE, &format!("/api/v1/cards/{first}")),
            StatusCode::OK,
        )
        .await;
        assert_eq!(deleted.id, first);
        assert_eq!(harness.store.member_ids(schema_id), vec![second]);

        let _: ApiErrorBody = send(
            &harness.router,
            empty_request(Method::DELETE, &format!("/api/v1/cards/{first}")),
            StatusCode::NOT_FOUND,
        )
        .await;

        let _: IdResponse = send(
            &harness.router,
            empty_request(Method::DELETE, &format!("/api/v1/schemas/{schema_id}")),
            StatusCode::OK,
        )
        .await;
        assert_eq!(harness.store.schema_count(), 0);
        assert_eq!(harness.store.card_count(), 0);
    }

    #[tokio::test]
    async fn schema_listing_honours_limit_and_offset() {
        let harness = harness();
        let first = add_schema(&harness).await;
        let second = add_schema(&harness).await;

        let all: SchemaListResponse = send(
            &harness.router,
            empty_request(Method::GET, "/api/v1/schemas"),
            StatusCode::OK,
        )
        .await;
        let ids: Vec<Uuid> = all.schemas.iter().map(|schema| schema.id).collect();
        assert_eq!(ids, vec![first, second]);

        let windowed: SchemaListResponse = send(
            &harness.router,
            empty_request(Method::GET, "/api/v1/schemas?limit=1&offset=1"),
            StatusCode::OK,
        )
        .await;
        assert_eq!(windowed.schemas.len(), 1);
        assert_eq!(windowed.schemas[0].id, second);
    }

    #[tokio::test]
    async fn writes_clear_the_public_cache() {
        let harness = harness();
        harness
            .state
            .api
            .cache
            .store
            .store("/products", bytes::Bytes::from_static(b"[]"))
            .expect("seed");

        add_schema(&harness).await;

        assert!(harness.state.api.cache.store.is_empty());
    }
}
