//! Sharded response cache storage.
//!
//! Entries live in `shard_count` independently locked maps selected by key
//! hash. A single atomic counter tracks the bytes held across all shards and
//! is reserved with compare-and-swap before an insert, so concurrent stores
//! cannot push it past the budget. Live entries are never evicted to make
//! room: a store that does not fit after expired entries are purged is
//! rejected.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use bytes::Bytes;
use metrics::{counter, gauge};
use thiserror::Error;

use super::config::{CacheConfig, MAX_TTL};
use super::keys::shard_index;
use super::lock::{rw_read, rw_write};

pub(crate) const METRIC_CACHE_HIT: &str = "tessera_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "tessera_cache_miss_total";
pub(crate) const METRIC_CACHE_EXPIRED: &str = "tessera_cache_expired_total";
pub(crate) const METRIC_CACHE_REJECTED: &str = "tessera_cache_rejected_total";
pub(crate) const METRIC_CACHE_BYTES: &str = "tessera_cache_bytes";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache entry not found")]
    NotFound,
    #[error("cache entry expired")]
    Expired,
    #[error("cache is full: {requested} bytes requested, {available} available")]
    CapacityExceeded { requested: u64, available: u64 },
    #[error("cache was invalidated while the response was rendered")]
    Stale,
}

/// A stored response body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub contents: Bytes,
    pub content_type: Option<HeaderValue>,
    pub valid_until: Instant,
}

impl CacheEntry {
    fn size(&self) -> u64 {
        self.contents.len() as u64
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.valid_until
    }
}

type Shard = RwLock<HashMap<String, CacheEntry>>;

pub struct ResponseCache {
    shards: Vec<Shard>,
    ttl: Duration,
    max_bytes: u64,
    size: AtomicU64,
    generation: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let shards = (0..config.shard_count_non_zero().get())
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            ttl: config.ttl.min(MAX_TTL),
            max_bytes: config.max_bytes,
            size: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Store `contents` under `key`, replacing any previous entry.
    pub fn store(&self, key: &str, contents: Bytes) -> Result<(), CacheError> {
        self.store_with_content_type(key, contents, None)
    }

    pub fn store_with_content_type(
        &self,
        key: &str,
        contents: Bytes,
        content_type: Option<HeaderValue>,
    ) -> Result<(), CacheError> {
        self.store_entry(key, contents, content_type, None)
    }

    /// Store a body rendered while the cache was at `generation`. If the
    /// cache has been invalidated since, nothing is stored and
    /// [`CacheError::Stale`] is returned.
    pub fn store_rendered(
        &self,
        key: &str,
        contents: Bytes,
        content_type: Option<HeaderValue>,
        generation: u64,
    ) -> Result<(), CacheError> {
        self.store_entry(key, contents, content_type, Some(generation))
    }

    /// Bumped by every [`invalidate_all`](Self::invalidate_all).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn store_entry(
        &self,
        key: &str,
        contents: Bytes,
        content_type: Option<HeaderValue>,
        generation: Option<u64>,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            contents,
            content_type,
            valid_until: Instant::now() + self.ttl,
        };

        let result = match self.insert(key, entry.clone(), generation) {
            Err(CacheError::CapacityExceeded { .. }) if self.purge_expired() > 0 => {
                self.insert(key, entry, generation)
            }
            other => other,
        };

        if matches!(result, Err(CacheError::CapacityExceeded { .. })) {
            counter!(METRIC_CACHE_REJECTED).increment(1);
        }
        self.record_size();
        result
    }

    /// Fetch a live entry. An expired entry is removed and its bytes are
    /// returned to the budget.
    pub fn get(&self, key: &str) -> Result<CacheEntry, CacheError> {
        let shard = self.shard(key);
        let now = Instant::now();

        {
            let entries = rw_read(shard, "get");
            match entries.get(key) {
                None => {
                    counter!(METRIC_CACHE_MISS).increment(1);
                    return Err(CacheError::NotFound);
                }
                Some(entry) if !entry.is_expired(now) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return Ok(entry.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = rw_write(shard, "get.expire");
        // Another writer may have refreshed the entry between the locks.
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                return Ok(entry.clone());
            }
            Some(_) => {
                if let Some(expired) = entries.remove(key) {
                    self.release(expired.size());
                }
            }
            None => {}
        }
        drop(entries);

        counter!(METRIC_CACHE_EXPIRED).increment(1);
        self.record_size();
        Err(CacheError::Expired)
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = rw_write(self.shard(key), "invalidate").remove(key);
        match removed {
            Some(entry) => {
                self.release(entry.size());
                self.record_size();
                true
            }
            None => false,
        }
    }

    pub fn invalidate_all(&self) {
        // Bump before clearing: a store that checked the old generation
        // holds its shard lock until the entry is in, so the sweep removes it.
        self.generation.fetch_add(1, Ordering::SeqCst);
        for shard in &self.shards {
            let mut entries = rw_write(shard, "invalidate_all");
            let freed: u64 = entries.values().map(CacheEntry::size).sum();
            entries.clear();
            self.release(freed);
        }
        self.record_size();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        for shard in &self.shards {
            let mut entries = rw_write(shard, "purge_expired");
            let mut freed = 0;
            entries.retain(|_, entry| {
                if entry.is_expired(now) {
                    freed += entry.size();
                    removed += 1;
                    false
                } else {
                    true
                }
            });
            self.release(freed);
        }

        if removed > 0 {
            counter!(METRIC_CACHE_EXPIRED).increment(removed as u64);
            self.record_size();
        }
        removed
    }

    /// Bytes currently held, expired-but-unpurged entries included.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| rw_read(shard, "len").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[shard_index(key, self.shards.len())]
    }

    fn insert(
        &self,
        key: &str,
        entry: CacheEntry,
        generation: Option<u64>,
    ) -> Result<(), CacheError> {
        let mut entries = rw_write(self.shard(key), "store");
        if generation.is_some_and(|expected| expected != self.generation()) {
            return Err(CacheError::Stale);
        }
        let replaced = entries.get(key).map(CacheEntry::size).unwrap_or(0);
        let incoming = entry.size();

        if incoming > replaced {
            self.reserve(incoming - replaced)?;
        }
        entries.insert(key.to_string(), entry);
        if replaced > incoming {
            self.release(replaced - incoming);
        }
        Ok(())
    }

    fn reserve(&self, bytes: u64) -> Result<(), CacheError> {
        self.size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(bytes)
                    .filter(|projected| *projected <= self.max_bytes)
            })
            .map(|_| ())
            .map_err(|current| CacheError::CapacityExceeded {
                requested: bytes,
                available: self.max_bytes.saturating_sub(current),
            })
    }

    fn release(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        // Every release pairs with an earlier reservation, so this never underflows.
        let _ = self
            .size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    fn record_size(&self) {
        gauge!(METRIC_CACHE_BYTES).set(self.size() as f64);
    }
}
