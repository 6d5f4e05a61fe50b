//! Cache Statistics Module
//!
//! Tracks cache observability counters: hits, stale hits, misses and
//! evictions, plus derived size snapshots.

use serde::Serialize;

// == Cache Stats ==
/// Cache performance counters.
///
/// `hits`, `stale_hits`, `misses` and `evictions` accumulate until
/// [`CacheStats::reset`]; `size` and `refreshing_count` are snapshots derived
/// from the store at the moment the stats are read, never mutated directly.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads served from a fresh entry
    pub hits: u64,
    /// Reads served from a stale entry (background refresh territory)
    pub stale_hits: u64,
    /// Reads that found no usable entry (absent or expired)
    pub misses: u64,
    /// Entries removed by LRU capacity eviction
    pub evictions: u64,
    /// Current number of entries in the store
    pub size: usize,
    /// Current number of entries with a background refresh outstanding
    pub refreshing_count: usize,
}

impl CacheStats {
    /// Creates stats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Fraction of reads served from cache (fresh or stale), or 0.0 when no
    /// reads have happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.stale_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.stale_hits) as f64 / total as f64
        }
    }

    // == Recorders ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_stale_hit(&mut self) {
        self.stale_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Reset ==
    /// Zeroes the accumulated counters. Derived snapshot fields are
    /// overwritten on the next read anyway.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
