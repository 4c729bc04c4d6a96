//! Tessera response cache
//!
//! An in-process, sharded byte cache in front of the public read endpoints.
//! Entries expire after a fixed TTL and all shards share one size budget;
//! once the budget is spent, further stores are rejected until expired
//! entries are reclaimed or the cache is invalidated.
//!
//! ```toml
//! [cache]
//! enabled = true
//! shard_count = 4
//! ttl_seconds = 600
//! max_size_mb = 10
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::request_key;
pub use middleware::{CacheState, invalidate_on_write, response_cache_layer};
pub use store::{CacheEntry, CacheError, ResponseCache};

pub(crate) use store::{
    METRIC_CACHE_BYTES, METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    METRIC_CACHE_REJECTED,
};
