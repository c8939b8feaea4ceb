//! In-memory response storage with a fixed time-to-live.

use std::sync::{Arc, RwLock};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use metrics::{counter, gauge};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::application::clock::Clock;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT: &str = "yatube_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "yatube_cache_miss_total";
pub const METRIC_CACHE_EXPIRED: &str = "yatube_cache_expired_total";
pub const METRIC_CACHE_ENTRIES: &str = "yatube_cache_entries";

/// Cached HTTP response.
#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

struct Entry {
    response: CachedResponse,
    expires_at: OffsetDateTime,
}

/// Response cache keyed by [`CacheKey`]. Entries expire a fixed interval
/// after they were stored; capacity overflow evicts the least recently used.
pub struct ResponseStore {
    entries: RwLock<LruCache<CacheKey, Entry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ResponseStore {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.response_limit_non_zero())),
            clock,
            ttl: Duration::try_from(config.index_ttl()).unwrap_or(Duration::MAX),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.pop(key);
                gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
                counter!(METRIC_CACHE_EXPIRED).increment(1);
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, response: CachedResponse) {
        let Some(expires_at) = self.clock.now().checked_add(self.ttl) else {
            warn!(
                target = "yatube::cache",
                ttl_secs = self.ttl.whole_seconds(),
                "cache lifetime overflows the calendar; response not stored"
            );
            return;
        };
        let mut entries = rw_write(&self.entries, SOURCE, "put");
        entries.put(
            key,
            Entry {
                response,
                expires_at,
            },
        );
        gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
    }

    /// Drop every cached response.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
        gauge!(METRIC_CACHE_ENTRIES).set(0.0);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Only plain successful pages are stored; anything setting a cookie is
/// specific to one visitor.
pub fn should_store_response(response: &Response) -> bool {
    response.status().is_success() && !response.headers().contains_key(header::SET_COOKIE)
}

/// Collect the body so it can be both stored and returned.
pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}
