//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

use tracing::warn;

/// Cache engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live in milliseconds; entries older than this are expired
    pub ttl_ms: u64,
    /// Age in milliseconds past which an entry is stale and served with a
    /// background refresh. Must stay below `ttl_ms` or the stale zone of
    /// the freshness state machine becomes unreachable.
    pub stale_threshold_ms: u64,
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Background sweep task interval in seconds
    pub sweep_interval_secs: u64,
    /// Ceiling in milliseconds after which an in-flight compute tracker is
    /// presumed hung and dropped by the sweep
    pub inflight_max_age_ms: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Entry time-to-live in ms (default: 300000, 5 minutes)
    /// - `CACHE_STALE_THRESHOLD_MS` - Stale threshold in ms (default: 120000, 2 minutes)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 60)
    /// - `CACHE_INFLIGHT_MAX_AGE_MS` - Hung-compute ceiling in ms (default: 300000)
    pub fn from_env() -> Self {
        let config = Self {
            ttl_ms: env_or("CACHE_TTL_MS", 300_000),
            stale_threshold_ms: env_or("CACHE_STALE_THRESHOLD_MS", 120_000),
            max_entries: env_or("CACHE_MAX_ENTRIES", 1000),
            sweep_interval_secs: env_or("CACHE_SWEEP_INTERVAL_SECS", 60),
            inflight_max_age_ms: env_or("CACHE_INFLIGHT_MAX_AGE_MS", 300_000),
        };
        config.warn_if_inconsistent();
        config
    }

    /// Logs a warning when `stale_threshold_ms >= ttl_ms`.
    ///
    /// The configuration is kept as given: every read past the threshold then
    /// behaves as an expired read (synchronous recompute), which is safe but
    /// defeats stale-while-revalidate.
    pub fn warn_if_inconsistent(&self) {
        if self.stale_threshold_ms >= self.ttl_ms {
            warn!(
                stale_threshold_ms = self.stale_threshold_ms,
                ttl_ms = self.ttl_ms,
                "stale threshold is not below TTL; stale-while-revalidate is disabled"
            );
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 300_000,
            stale_threshold_ms: 120_000,
            max_entries: 1000,
            sweep_interval_secs: 60,
            inflight_max_age_ms: 300_000,
        }
    }
}

/// Reads an environment variable, falling back to `default` when unset or
/// unparsable.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
