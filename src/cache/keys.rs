//! Cache key derivation and shard selection.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::http::Uri;

fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Cache key for a request: the full path plus query string, as received.
pub fn request_key(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Shard index for `key` among `shard_count` shards.
pub(crate) fn shard_index(key: &str, shard_count: usize) -> usize {
    (hash_value(&key) % shard_count.max(1) as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_key_keeps_query() {
        let uri: Uri = "/products/abc?limit=5&page=1".parse().expect("uri");
        assert_eq!(request_key(&uri), "/products/abc?limit=5&page=1");

        let uri: Uri = "/products".parse().expect("uri");
        assert_eq!(request_key(&uri), "/products");
    }

    #[test]
    fn different_queries_produce_different_keys() {
        let first: Uri = "/products/abc?page=1".parse().expect("uri");
        let second: Uri = "/products/abc?page=2".parse().expect("uri");
        assert_ne!(request_key(&first), request_key(&second));
    }

    #[test]
    fn shard_index_is_stable_and_in_range() {
        for key in ["/a", "/b", "/products?page=3"] {
            let index = shard_index(key, 4);
            assert!(index < 4);
            assert_eq!(index, shard_index(key, 4));
        }
        assert_eq!(shard_index("/a", 1), 0);
        assert_eq!(shard_index("/a", 0), 0);
    }
}
