//! In-Flight Request Module
//!
//! Tracks currently-executing compute calls so concurrent callers for the
//! same key share one result instead of triggering duplicate work. At most
//! one tracker exists per key; the computing task removes its own tracker
//! when it settles, success or failure.

use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::error::Result;

/// Result broadcast to every waiter of a tracked compute.
pub type ComputeResult<T> = Result<T>;

// == In-Flight Request ==
/// A single outstanding compute call.
#[derive(Debug)]
pub struct InFlightRequest<T> {
    /// Settlement channel; the computing task sends exactly one message
    sender: broadcast::Sender<ComputeResult<T>>,
    /// Registration timestamp (Unix milliseconds), used by the sweep to
    /// drop trackers whose compute never settled
    pub started_at: u64,
}

// == In-Flight Table ==
/// All outstanding compute calls, keyed by cache key.
#[derive(Debug, Default)]
pub struct InFlightTable<T> {
    requests: HashMap<String, InFlightRequest<T>>,
}

impl<T: Clone> InFlightTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
        }
    }

    // == Register ==
    /// Registers a tracker for `key` and returns the settlement sender.
    ///
    /// Callers must have checked [`InFlightTable::subscribe`] first; a
    /// second registration for the same key would strand the first
    /// tracker's waiters.
    pub fn register(&mut self, key: &str, now: u64) -> broadcast::Sender<ComputeResult<T>> {
        debug_assert!(!self.requests.contains_key(key), "duplicate in-flight tracker");
        // Exactly one message is ever sent per tracker
        let (sender, _) = broadcast::channel(1);
        self.requests.insert(
            key.to_string(),
            InFlightRequest {
                sender: sender.clone(),
                started_at: now,
            },
        );
        sender
    }

    // == Subscribe ==
    /// Subscribes to an existing tracker's settlement, if one is outstanding.
    pub fn subscribe(&self, key: &str) -> Option<broadcast::Receiver<ComputeResult<T>>> {
        self.requests.get(key).map(|req| req.sender.subscribe())
    }

    // == Remove ==
    /// Drops the tracker for `key`; returns whether one existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.requests.remove(key).is_some()
    }

    // == Remove Settled ==
    /// Drops the tracker for `key` only when it is the one settled through
    /// `sender`; returns whether it was.
    ///
    /// A compute task deregistering itself must not evict a newer tracker
    /// registered after its own was removed by delete, invalidation or the
    /// hung-tracker sweep: that would let a third caller start a duplicate
    /// compute while the newer one is still outstanding.
    pub fn remove_settled(
        &mut self,
        key: &str,
        sender: &broadcast::Sender<ComputeResult<T>>,
    ) -> bool {
        match self.requests.get(key) {
            Some(req) if req.sender.same_channel(sender) => {
                self.requests.remove(key);
                true
            }
            _ => false,
        }
    }

    // == Remove Matching ==
    /// Drops every tracker whose key satisfies the predicate; returns the
    /// number removed.
    pub fn remove_matching<F: Fn(&str) -> bool>(&mut self, matches: F) -> usize {
        let before = self.requests.len();
        self.requests.retain(|key, _| !matches(key));
        before - self.requests.len()
    }

    // == Remove Older Than ==
    /// Drops every tracker registered at or before `cutoff` and returns the
    /// affected keys. Waiters on a dropped tracker observe a closed channel
    /// once the hung task's sender finally goes away.
    pub fn remove_older_than(&mut self, cutoff: u64) -> Vec<String> {
        let stale_keys: Vec<String> = self
            .requests
            .iter()
            .filter(|(_, req)| req.started_at <= cutoff)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale_keys {
            self.requests.remove(key);
        }
        stale_keys
    }

    // == Clear ==
    /// Drops every tracker.
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    /// Number of outstanding trackers.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when no compute is outstanding.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_then_subscribe_receives_result() {
        let mut table: InFlightTable<String> = InFlightTable::new();

        let sender = table.register("k", 1_000);
        let mut rx = table.subscribe("k").expect("tracker should exist");

        sender.send(Ok("v".to_string())).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.unwrap(), "v");
    }

    #[test]
    fn test_subscribe_absent_key() {
        let table: InFlightTable<String> = InFlightTable::new();
        assert!(table.subscribe("missing").is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut table: InFlightTable<u32> = InFlightTable::new();
        table.register("k", 1_000);

        assert!(table.remove("k"));
        assert!(!table.remove("k"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_settled_only_drops_own_tracker() {
        let mut table: InFlightTable<u32> = InFlightTable::new();
        let old_sender = table.register("k", 1_000);

        // The old tracker goes away (delete/invalidate/sweep) and a newer
        // compute registers for the same key.
        table.remove("k");
        let new_sender = table.register("k", 2_000);

        // The old task settling must leave the newer tracker in place.
        assert!(!table.remove_settled("k", &old_sender));
        assert_eq!(table.len(), 1);
        assert!(table.subscribe("k").is_some());

        assert!(table.remove_settled("k", &new_sender));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_matching_by_prefix() {
        let mut table: InFlightTable<u32> = InFlightTable::new();
        table.register("paper:list:user-1", 1_000);
        table.register("paper:detail:user-1:p1", 1_000);
        table.register("paper:list:user-2", 1_000);

        let removed = table.remove_matching(|key| key.starts_with("paper:list:user-1"));

        assert_eq!(removed, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_older_than_keeps_recent_trackers() {
        let mut table: InFlightTable<u32> = InFlightTable::new();
        table.register("old", 1_000);
        table.register("recent", 5_000);

        let removed = table.remove_older_than(2_000);

        assert_eq!(removed, vec!["old".to_string()]);
        assert_eq!(table.len(), 1);
        assert!(table.subscribe("recent").is_some());
    }

    #[tokio::test]
    async fn test_waiters_subscribed_before_send_still_receive() {
        let mut table: InFlightTable<u32> = InFlightTable::new();
        let sender = table.register("k", 1_000);
        let mut rx = table.subscribe("k").unwrap();

        // Send happens before the receiver is polled; broadcast buffers it.
        sender.send(Ok(7)).unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), 7);
    }
}
