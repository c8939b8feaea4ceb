//! Response cache for the post index.
//!
//! Rendered index pages are kept in memory for a short fixed window (20
//! seconds by default) under the `index` namespace. Entries are never
//! invalidated by writes: a new post shows up on `/` once the window
//! lapses. [`ResponseStore::clear`] drops everything at once.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_secs = 20
//! response_limit = 200
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, INDEX_NAMESPACE, hash_query, hash_value};
pub use middleware::{CacheState, index_cache_layer};
pub use store::{
    CacheStoreError, CachedResponse, METRIC_CACHE_ENTRIES, METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT,
    METRIC_CACHE_MISS, ResponseStore, buffer_response, should_store_response,
};
