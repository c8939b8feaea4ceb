//! Cache key definitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Namespace for cached renderings of the post index.
pub const INDEX_NAMESPACE: &str = "index";

/// Identifies one cached response.
///
/// The viewer is part of the key because the page chrome differs between
/// anonymous and signed-in visitors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: &'static str,
    pub path: String,
    pub query_hash: u64,
    pub viewer: Option<i64>,
}

impl CacheKey {
    pub fn index(path: &str, query: &str, viewer: Option<i64>) -> Self {
        Self {
            namespace: INDEX_NAMESPACE,
            path: path.to_string(),
            query_hash: hash_query(query),
            viewer,
        }
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a query string for cache key generation.
pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}
