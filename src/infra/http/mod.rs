pub mod api;
mod middleware;
mod public;

pub use api::{ApiState, build_api_router as build_api_v1_router};
pub use public::{PublicState, build_router};

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Router, middleware as axum_middleware, routing::get};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;
use crate::application::error::HttpError;
use crate::application::repos::RepoError;
use crate::infra::db::PostgresRepositories;

use self::middleware::{log_responses, set_request_context};

/// Connectivity check behind the `/health` endpoints.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), SqlxError>;
}

#[async_trait]
impl HealthProbe for PostgresRepositories {
    async fn check(&self) -> Result<(), SqlxError> {
        self.health_check().await
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error response for the public surface.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) | RepoError::Corrupt { message } => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub public: PublicState,
    pub api: ApiState,
}

impl FromRef<RouterState> for PublicState {
    fn from_ref(state: &RouterState) -> Self {
        state.public.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

/// Admin listener: the JSON API plus an uncached health check.
pub fn build_admin_router(state: RouterState) -> Router {
    let health: Arc<dyn HealthProbe> = state.public.health.clone();

    build_api_v1_router(state.clone())
        .route(
            "/health",
            get(move || {
                let health = health.clone();
                async move { db_health_response(health.check().await) }
            }),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::num::NonZeroU32;

    use crate::application::cards::CardService;
    use crate::application::schemas::SchemaService;
    use crate::application::test_support::InMemoryStore;
    use crate::cache::{CacheConfig, CacheState};

    use super::*;

    pub(crate) struct HealthyProbe;

    #[async_trait]
    impl HealthProbe for HealthyProbe {
        async fn check(&self) -> Result<(), SqlxError> {
            Ok(())
        }
    }

    pub(crate) fn router_state(store: Arc<InMemoryStore>) -> RouterState {
        let schemas = Arc::new(SchemaService::new(store.clone(), store.clone()));
        let cards = Arc::new(CardService::new(
            store.clone(),
            store.clone(),
            store,
            NonZeroU32::new(10).expect("non-zero"),
        ));
        let cache = CacheState::new(CacheConfig::default());

        RouterState {
            public: PublicState {
                schemas: schemas.clone(),
                cards: cards.clone(),
                health: Arc::new(HealthyProbe),
                cache: cache.clone(),
            },
            api: ApiState {
                schemas,
                cards,
                cache,
            },
        }
    }
}
