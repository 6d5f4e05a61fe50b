//! LRU Tracker Module
//!
//! Tracks key recency for capacity eviction. Backed by a VecDeque: front is
//! the most recently accessed key, back is the eviction candidate. Keys never
//! touched again keep their insertion order, which makes eviction order
//! deterministic under equal access times.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Recency order over cache keys, least recently used at the back.
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as just accessed, moving it to the front. Unknown keys
    /// are inserted.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == Remove ==
    /// Drops a key from the tracker; no-op when absent.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Retain ==
    /// Keeps only keys for which the predicate holds.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.order.retain(|k| keep(k));
    }

    // == Pop LRU ==
    /// Removes and returns the least recently used key, or None when empty.
    pub fn pop_lru(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    /// Returns the least recently used key without removing it.
    pub fn peek_lru(&self) -> Option<&String> {
        self.order.back()
    }

    // == Clear ==
    /// Drops every tracked key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True when the key is tracked.
    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_insertion_order_is_eviction_order() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("b");
        lru.touch("c");

        assert_eq!(lru.pop_lru(), Some("a".to_string()));
        assert_eq!(lru.pop_lru(), Some("b".to_string()));
        assert_eq!(lru.pop_lru(), Some("c".to_string()));
        assert_eq!(lru.pop_lru(), None);
    }

    #[test]
    fn test_lru_touch_moves_to_front() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("b");
        lru.touch("c");

        lru.touch("a");

        assert_eq!(lru.peek_lru(), Some(&"b".to_string()));
        assert_eq!(lru.pop_lru(), Some("b".to_string()));
        assert_eq!(lru.pop_lru(), Some("c".to_string()));
        assert_eq!(lru.pop_lru(), Some("a".to_string()));
    }

    #[test]
    fn test_lru_touch_is_idempotent_on_count() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("a");
        lru.touch("a");
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("b");

        lru.remove("a");
        lru.remove("missing");

        assert_eq!(lru.len(), 1);
        assert!(!lru.contains("a"));
        assert!(lru.contains("b"));
    }

    #[test]
    fn test_lru_retain() {
        let mut lru = LruTracker::new();
        lru.touch("paper:list:user-1");
        lru.touch("paper:list:user-2");
        lru.touch("paper:detail:user-1:p1");

        lru.retain(|k| !k.contains("user-1"));

        assert_eq!(lru.len(), 1);
        assert!(lru.contains("paper:list:user-2"));
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("b");
        lru.clear();
        assert!(lru.is_empty());
    }
}
