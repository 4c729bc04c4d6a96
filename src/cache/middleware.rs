//! Response cache middleware.
//!
//! Serves GET requests on the public surface from the cache and stores
//! successful responses. Writes on the admin surface drop every cached
//! response so listings never outlive the data they were built from.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::{CacheConfig, CacheError, ResponseCache, keys::request_key, store::CacheEntry};

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseCache>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(ResponseCache::new(&config));
        Self { config, store }
    }
}

/// Only GET requests answered with 200 OK are cached.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = request_key(request.uri());

    match cache.store.get(&key) {
        Ok(entry) => {
            debug!(cache = "response", outcome = "hit", "serving cached response");
            return build_response(entry);
        }
        Err(CacheError::Expired) => {
            debug!(cache = "response", outcome = "expired", "cached response expired");
        }
        Err(_) => {
            debug!(cache = "response", outcome = "miss", "cache miss, executing handler");
        }
    }

    let generation = cache.store.generation();
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache = "response", error = %err, "failed to collect response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();
    match cache
        .store
        .store_rendered(&key, bytes.clone(), content_type, generation)
    {
        Ok(()) => {}
        Err(CacheError::Stale) => {
            debug!(cache = "response", key = %key, outcome = "stale", "response not cached");
        }
        Err(err) => warn!(
            cache = "response",
            key = %key,
            error = %err,
            "response not cached"
        ),
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Invalidate the whole cache after any successful non-GET request.
pub async fn invalidate_on_write(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let mutating = method != Method::GET && method != Method::HEAD && method != Method::OPTIONS;
    let response = next.run(request).await;

    if mutating && response.status().is_success() {
        cache.store.invalidate_all();
        debug!(cache = "response", outcome = "invalidated", "admin write cleared cache");
    }

    response
}

fn build_response(entry: CacheEntry) -> Response {
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(content_type) = entry.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(entry.contents))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
