//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_SHARD_COUNT: usize = 4;
const DEFAULT_TTL: Duration = Duration::from_secs(600);
const DEFAULT_MAX_BYTES: u64 = 10_000_000;
/// Longest lifetime an entry can be given; longer settings are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Response cache configuration, derived from the `[cache]` settings section.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and populate cached responses.
    pub enabled: bool,
    /// Number of independently locked shards.
    pub shard_count: usize,
    /// Lifetime of an entry after it is stored, at most [`MAX_TTL`].
    pub ttl: Duration,
    /// Global budget over all stored bodies, in bytes.
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shard_count: DEFAULT_SHARD_COUNT,
            ttl: DEFAULT_TTL,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            shard_count: settings.shard_count.get() as usize,
            ttl: settings.ttl,
            max_bytes: settings.max_bytes,
        }
    }
}

impl CacheConfig {
    /// Returns the shard count as NonZeroUsize, clamping to 1 if zero.
    pub fn shard_count_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.shard_count).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.shard_count, 4);
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.max_bytes, 10_000_000);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            shard_count: 0,
            ..Default::default()
        };
        assert_eq!(config.shard_count_non_zero().get(), 1);
    }
}
