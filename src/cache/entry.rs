//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and the three-zone
//! freshness state machine (fresh / stale / expired).

use std::time::{SystemTime, UNIX_EPOCH};

// == Freshness ==
/// Position of an entry in the freshness state machine, by age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Age at or below the stale threshold; served as-is
    Fresh,
    /// Age between the stale threshold and the TTL; served immediately
    /// while a background refresh is attempted
    Stale,
    /// Age beyond the TTL; treated as absent
    Expired,
}

// == Cache Entry ==
/// A single cache entry with value and lifecycle metadata.
///
/// Entries are refreshed in place: a background refresh replaces `value` and
/// `created_at` and clears `is_refreshing`, so readers observing the entry
/// mid-refresh always see a coherent snapshot.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Creation or last-refresh timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last read timestamp (Unix milliseconds), drives LRU eviction
    pub last_accessed_at: u64,
    /// Set while a background refresh for this key is outstanding
    pub is_refreshing: bool,
    /// Time-to-live for this entry in milliseconds
    pub ttl_ms: u64,
    /// Age past which this entry is stale, in milliseconds
    pub stale_after_ms: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped at `now`.
    ///
    /// The TTL and stale threshold are captured per entry so call-site
    /// overrides keep classifying consistently on later reads.
    pub fn new(value: T, now: u64, ttl_ms: u64, stale_after_ms: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            is_refreshing: false,
            ttl_ms,
            stale_after_ms,
        }
    }

    // == Age ==
    /// Entry age in milliseconds at time `now`.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    // == Freshness ==
    /// Classifies the entry at time `now`.
    ///
    /// Boundary conditions: an entry exactly at the stale threshold is still
    /// fresh, and an entry exactly at the TTL is still stale (served); only
    /// strictly older entries are expired.
    pub fn freshness(&self, now: u64) -> Freshness {
        let age = self.age_ms(now);
        if age > self.ttl_ms {
            // Checked first so a TTL below the stale threshold still expires
            Freshness::Expired
        } else if age <= self.stale_after_ms {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    /// True when the entry's age exceeds its TTL.
    pub fn is_expired(&self, now: u64) -> bool {
        self.freshness(now) == Freshness::Expired
    }

    // == Touch ==
    /// Marks the entry as read at `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed_at = now;
    }

    // == Refresh ==
    /// Replaces the value in place after a successful recompute.
    ///
    /// Resets `created_at` (the entry is fresh again) and clears the
    /// refreshing flag. `last_accessed_at` is left alone: a background
    /// refresh is not a read.
    pub fn refresh(&mut self, value: T, now: u64) {
        self.value = value;
        self.created_at = now;
        self.is_refreshing = false;
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
