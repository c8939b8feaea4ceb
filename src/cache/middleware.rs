//! Index response cache middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::infra::http::Viewer;

use super::{
    CacheConfig,
    keys::CacheKey,
    store::{ResponseStore, buffer_response, should_store_response},
};

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig, store: Arc<ResponseStore>) -> Self {
        Self { config, store }
    }
}

/// Serve `GET` requests for the index from the cache, storing successful
/// renders on a miss. Must run after the viewer has been resolved.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn index_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.user().map(|user| user.id));
    let key = CacheKey::index(
        request.uri().path(),
        request.uri().query().unwrap_or(""),
        viewer,
    );

    if let Some(cached) = cache.store.get(&key) {
        debug!(cache = "index", outcome = "hit", "serving cached response");
        return cached.into_response();
    }
    debug!(cache = "index", outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match buffer_response(response).await {
        Ok((response, cached)) => {
            cache.store.put(key, cached);
            response
        }
        Err((response, err)) => {
            warn!(target = "yatube::cache", error = %err, "response not cached");
            response
        }
    }
}
