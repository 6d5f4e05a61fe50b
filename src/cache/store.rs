//! Cache Store Module
//!
//! Owns the key-to-entry map together with LRU tracking and the stats
//! counters. The store is purely synchronous and keeps no notion of compute
//! calls; the engine layers the freshness state machine and deduplication on
//! top of these primitives.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker};

// == Cache Store ==
/// Entry storage with LRU capacity enforcement.
///
/// Absence is always represented (`Option`/`bool` returns), never an error.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Key-to-entry storage; exclusive owner of all entries
    entries: HashMap<String, CacheEntry<T>>,
    /// Recency order for capacity eviction
    lru: LruTracker,
    /// Observability counters
    stats: CacheStats,
    /// Maximum number of entries before LRU eviction kicks in
    max_entries: usize,
}

impl<T: Clone> CacheStore<T> {
    // == Constructor ==
    /// Creates an empty store bounded to `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
        }
    }

    // == Lookup ==
    /// Returns the entry for `key`, if any. Does not touch recency; callers
    /// decide whether the access counts as a read.
    pub fn lookup(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Insert ==
    /// Creates or overwrites the entry for `key`, stamping it at `now`.
    ///
    /// Capacity is enforced before the insertion, so the map never holds
    /// more than `max_entries` entries once this returns.
    pub fn insert(&mut self, key: &str, value: T, now: u64, ttl_ms: u64, stale_after_ms: u64) {
        if !self.entries.contains_key(key) {
            self.ensure_capacity();
        }
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, now, ttl_ms, stale_after_ms));
        self.lru.touch(key);
    }

    // == Apply Refresh ==
    /// Installs the result of a successful recompute.
    ///
    /// Refreshes the existing entry in place (value and `created_at`
    /// replaced, `is_refreshing` cleared); falls back to a plain insert when
    /// the entry was invalidated while the compute ran.
    pub fn apply_refresh(&mut self, key: &str, value: T, now: u64, ttl_ms: u64, stale_after_ms: u64) {
        match self.entries.get_mut(key) {
            Some(entry) => entry.refresh(value, now),
            None => self.insert(key, value, now, ttl_ms, stale_after_ms),
        }
    }

    // == Clear Refreshing ==
    /// Clears the refresh-outstanding flag for `key`, if present.
    pub fn clear_refreshing(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.is_refreshing = false;
        }
    }

    /// Marks a background refresh as outstanding for `key`.
    pub fn mark_refreshing(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.is_refreshing = true;
        }
    }

    // == Touch ==
    /// Records a read of `key` at `now` for LRU purposes.
    pub fn touch(&mut self, key: &str, now: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.touch(now);
            self.lru.touch(key);
        }
    }

    // == Remove ==
    /// Removes the entry for `key`; returns whether one existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
        }
        removed
    }

    // == Remove Matching ==
    /// Removes every entry whose key satisfies the predicate; returns the
    /// number removed.
    pub fn remove_matching<F: Fn(&str) -> bool>(&mut self, matches: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !matches(key));
        self.lru.retain(|key| !matches(key));
        before - self.entries.len()
    }

    // == Cleanup Expired ==
    /// Removes every TTL-expired entry as of `now`; returns the number
    /// removed.
    pub fn cleanup_expired(&mut self, now: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }
        expired_keys.len()
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Stats ==
    /// Snapshot of the counters with derived size fields filled in.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.size = self.entries.len();
        stats.refreshing_count = self.refreshing_count();
        stats
    }

    /// Zeroes the accumulated counters.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn record_hit(&mut self) {
        self.stats.record_hit();
    }

    pub fn record_stale_hit(&mut self) {
        self.stats.record_stale_hit();
    }

    pub fn record_miss(&mut self) {
        self.stats.record_miss();
    }

    // == Length ==
    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with a background refresh outstanding.
    fn refreshing_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_refreshing).count()
    }

    // == Ensure Capacity ==
    /// Evicts least-recently-accessed entries until at least one slot is
    /// free for an incoming insertion.
    fn ensure_capacity(&mut self) {
        while self.entries.len() >= self.max_entries {
            match self.lru.pop_lru() {
                Some(victim) => {
                    self.entries.remove(&victim);
                    self.stats.record_eviction();
                    debug!(key = %victim, "evicted least-recently-used entry");
                }
                // Tracker drained but map still over budget: nothing left
                // to evict deterministically, stop rather than spin.
                None => break,
            }
        }
    }
}
