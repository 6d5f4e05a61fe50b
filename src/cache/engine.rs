//! Cache Engine Module
//!
//! The behavioral core: `get_or_compute` with the three-zone freshness state
//! machine (fresh / stale / expired), deduplication of concurrent computes,
//! background stale refresh, and the synchronous read/write/invalidate
//! surface.
//!
//! One mutex guards the store and the in-flight table together, and it is
//! never held across an `.await`: classification happens in a single
//! critical section that produces a plan, and the plan is executed outside
//! the lock.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::inflight::{ComputeResult, InFlightTable};
use crate::cache::{CacheStats, CacheStore, Freshness};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cached Value ==
/// A cache read result tagged with freshness flags.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    /// The cached (or just-computed) value
    pub value: T,
    /// True when the value is within its stale threshold (or just computed)
    pub is_fresh: bool,
    /// True when a background refresh or shared compute was outstanding at
    /// read time
    pub is_refreshing: bool,
    /// Entry age at read time in milliseconds; zero for just-computed values
    pub age_ms: u64,
}

// == Options ==
/// Per-call overrides for [`Cache::get_or_compute_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeOptions {
    /// Overrides the configured TTL for the entry this call populates
    pub ttl_ms: Option<u64>,
    /// Overrides the configured stale threshold likewise
    pub stale_threshold_ms: Option<u64>,
}

/// Per-call overrides for [`Cache::set_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Overrides the configured TTL for the written entry
    pub ttl_ms: Option<u64>,
}

// == Sweep Report ==
/// What a maintenance sweep removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    /// TTL-expired entries dropped from the store
    pub expired_removed: usize,
    /// Hung in-flight trackers dropped from the table
    pub inflight_removed: usize,
}

impl SweepReport {
    /// True when the sweep removed nothing.
    pub fn is_empty(&self) -> bool {
        self.expired_removed == 0 && self.inflight_removed == 0
    }
}

// == Engine State ==
/// Store and in-flight table, guarded together so two computes for the same
/// key can never race each other into the store.
#[derive(Debug)]
struct EngineState<T> {
    store: CacheStore<T>,
    inflight: InFlightTable<T>,
}

// == Read Plan ==
/// Outcome of the classification critical section; executed lock-free.
enum ReadPlan<T> {
    /// Entry usable as-is (fresh, or stale with a refresh already running)
    Serve(CachedValue<T>),
    /// Another caller's compute is outstanding; await its broadcast
    Join(broadcast::Receiver<ComputeResult<T>>),
    /// Serve the stale value now and refresh in the background
    Refresh {
        stale: CachedValue<T>,
        sender: broadcast::Sender<ComputeResult<T>>,
    },
    /// Miss or expired; compute synchronously (from the caller's view)
    Compute {
        receiver: broadcast::Receiver<ComputeResult<T>>,
        sender: broadcast::Sender<ComputeResult<T>>,
    },
}

// == Cache ==
/// In-process stale-while-revalidate cache.
///
/// Cheap to clone (handles share one store); construct once at startup and
/// pass by reference or clone into tasks. `get`, `set`, `delete` and the
/// invalidation operations are synchronous; only [`Cache::get_or_compute`]
/// suspends.
#[derive(Debug)]
pub struct Cache<T> {
    state: Arc<Mutex<EngineState<T>>>,
    config: CacheConfig,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            config: self.config.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Cache<T> {
    // == Constructor ==
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        config.warn_if_inconsistent();
        Self {
            state: Arc::new(Mutex::new(EngineState {
                store: CacheStore::new(config.max_entries),
                inflight: InFlightTable::new(),
            })),
            config,
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, computing it when absent or
    /// expired, with the configured TTL and stale threshold.
    ///
    /// See [`Cache::get_or_compute_with`] for the full contract.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<CachedValue<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.get_or_compute_with(key, compute, ComputeOptions::default()).await
    }

    /// Returns the cached value for `key`, computing it when needed.
    ///
    /// - A compute already outstanding for `key` (ours or another caller's)
    ///   is joined: its result is shared instead of issuing a duplicate call.
    /// - A fresh entry is returned directly.
    /// - A stale entry is returned immediately while `compute` runs in the
    ///   background; a background failure is logged and the stale value stays
    ///   authoritative.
    /// - A miss or expired entry runs `compute` and the caller awaits it;
    ///   failures propagate and leave the key unpopulated so the next call
    ///   retries.
    ///
    /// The compute task is spawned, so it runs to completion and populates
    /// the cache even if this caller's future is dropped mid-await.
    pub async fn get_or_compute_with<F, Fut>(
        &self,
        key: &str,
        compute: F,
        options: ComputeOptions,
    ) -> Result<CachedValue<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let ttl_ms = options.ttl_ms.unwrap_or(self.config.ttl_ms);
        let stale_after_ms = options.stale_threshold_ms.unwrap_or(self.config.stale_threshold_ms);

        let plan = self.classify(key);

        match plan {
            ReadPlan::Serve(cached) => Ok(cached),
            ReadPlan::Join(receiver) => self.await_settlement(key, receiver, true).await,
            ReadPlan::Refresh { stale, sender } => {
                self.spawn_compute(key.to_string(), compute, ttl_ms, stale_after_ms, sender, true);
                Ok(stale)
            }
            ReadPlan::Compute { receiver, sender } => {
                self.spawn_compute(key.to_string(), compute, ttl_ms, stale_after_ms, sender, false);
                self.await_settlement(key, receiver, false).await
            }
        }
    }

    // == Get ==
    /// Non-computing read. Returns the value with freshness flags when
    /// present and not TTL-expired; expired entries are evicted on read.
    /// Never triggers a refresh.
    pub fn get(&self, key: &str) -> Option<CachedValue<T>> {
        let mut state = self.state.lock();
        let now = current_timestamp_ms();

        let snapshot = state
            .store
            .lookup(key)
            .map(|e| (e.value.clone(), e.freshness(now), e.is_refreshing, e.age_ms(now)));

        match snapshot {
            Some((value, Freshness::Fresh, is_refreshing, age_ms)) => {
                state.store.touch(key, now);
                state.store.record_hit();
                Some(CachedValue { value, is_fresh: true, is_refreshing, age_ms })
            }
            Some((value, Freshness::Stale, is_refreshing, age_ms)) => {
                state.store.touch(key, now);
                state.store.record_stale_hit();
                Some(CachedValue { value, is_fresh: false, is_refreshing, age_ms })
            }
            Some((_, Freshness::Expired, _, _)) => {
                state.store.remove(key);
                state.store.record_miss();
                None
            }
            None => {
                state.store.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Unconditional write with the configured TTL. Resets the entry's age;
    /// used to warm the cache when the caller already holds authoritative
    /// data (e.g. right after a successful mutation).
    pub fn set(&self, key: &str, value: T) {
        self.set_with(key, value, SetOptions::default());
    }

    /// [`Cache::set`] with a per-entry TTL override.
    pub fn set_with(&self, key: &str, value: T, options: SetOptions) {
        let ttl_ms = options.ttl_ms.unwrap_or(self.config.ttl_ms);
        let mut state = self.state.lock();
        let now = current_timestamp_ms();
        state.store.insert(key, value, now, ttl_ms, self.config.stale_threshold_ms);
    }

    // == Delete ==
    /// Removes the entry and any in-flight tracker for `key`; idempotent.
    /// Returns whether an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.inflight.remove(key);
        state.store.remove(key)
    }

    // == Invalidate ==
    /// Removes every entry (and tracker) whose key starts with `prefix`;
    /// returns the number of entries removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let prefix = prefix.to_string();
        self.invalidate_matching(move |key| key.starts_with(prefix.as_str()))
    }

    /// Removes every entry (and tracker) whose key satisfies the predicate;
    /// returns the number of entries removed.
    pub fn invalidate_matching<F: Fn(&str) -> bool>(&self, matches: F) -> usize {
        let mut state = self.state.lock();
        let removed = state.store.remove_matching(&matches);
        state.inflight.remove_matching(&matches);
        if removed > 0 {
            debug!(removed, "invalidated cache entries by pattern");
        }
        removed
    }

    // == Clear ==
    /// Removes all entries and trackers. Intended for tests and shutdown.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        state.inflight.clear();
    }

    // == Stats ==
    /// Snapshot of the observability counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().store.stats()
    }

    /// Zeroes the accumulated counters.
    pub fn reset_stats(&self) {
        self.state.lock().store.reset_stats();
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    // == Sweep ==
    /// One maintenance pass: drops TTL-expired entries and in-flight
    /// trackers older than the configured ceiling, clearing the refresh
    /// flag of affected entries so future stale reads can retry.
    ///
    /// Normally driven by [`crate::tasks::spawn_sweep_task`], but callable
    /// directly.
    pub fn sweep(&self) -> SweepReport {
        let mut state = self.state.lock();
        let now = current_timestamp_ms();

        let expired_removed = state.store.cleanup_expired(now);

        let cutoff = now.saturating_sub(self.config.inflight_max_age_ms);
        let hung_keys = state.inflight.remove_older_than(cutoff);
        for key in &hung_keys {
            state.store.clear_refreshing(key);
            warn!(key = %key, "dropped in-flight tracker that never settled");
        }

        SweepReport {
            expired_removed,
            inflight_removed: hung_keys.len(),
        }
    }

    // == Classification ==
    /// Single critical section: decide how to serve this read.
    fn classify(&self, key: &str) -> ReadPlan<T> {
        let mut state = self.state.lock();

        if let Some(receiver) = state.inflight.subscribe(key) {
            return ReadPlan::Join(receiver);
        }

        let now = current_timestamp_ms();
        let snapshot = state
            .store
            .lookup(key)
            .map(|e| (e.value.clone(), e.freshness(now), e.is_refreshing, e.age_ms(now)));

        match snapshot {
            Some((value, Freshness::Fresh, is_refreshing, age_ms)) => {
                state.store.touch(key, now);
                state.store.record_hit();
                ReadPlan::Serve(CachedValue { value, is_fresh: true, is_refreshing, age_ms })
            }
            Some((value, Freshness::Stale, is_refreshing, age_ms)) => {
                state.store.touch(key, now);
                state.store.record_stale_hit();
                let stale = CachedValue { value, is_fresh: false, is_refreshing: true, age_ms };
                if is_refreshing {
                    // Refresh flagged but no tracker (it was swept as hung):
                    // keep serving stale without piling on another compute.
                    ReadPlan::Serve(stale)
                } else {
                    state.store.mark_refreshing(key);
                    let sender = state.inflight.register(key, now);
                    ReadPlan::Refresh { stale, sender }
                }
            }
            Some((_, Freshness::Expired, _, _)) => {
                state.store.remove(key);
                state.store.record_miss();
                let sender = state.inflight.register(key, now);
                let receiver = sender.subscribe();
                ReadPlan::Compute { receiver, sender }
            }
            None => {
                state.store.record_miss();
                let sender = state.inflight.register(key, now);
                let receiver = sender.subscribe();
                ReadPlan::Compute { receiver, sender }
            }
        }
    }

    // == Compute Task ==
    /// Runs `compute` on its own task, installs the result, removes the
    /// in-flight tracker unconditionally, and broadcasts the settlement to
    /// every waiter.
    fn spawn_compute<F, Fut>(
        &self,
        key: String,
        compute: F,
        ttl_ms: u64,
        stale_after_ms: u64,
        sender: broadcast::Sender<ComputeResult<T>>,
        background: bool,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = compute().await;
            let now = current_timestamp_ms();

            let settled: ComputeResult<T> = match result {
                Ok(value) => {
                    let mut state = state.lock();
                    // Identity-aware: if this task's tracker was replaced
                    // (delete/invalidate/sweep then a new compute), the
                    // newer tracker must keep deduplicating.
                    state.inflight.remove_settled(&key, &sender);
                    state.store.apply_refresh(&key, value.clone(), now, ttl_ms, stale_after_ms);
                    Ok(value)
                }
                Err(cause) => {
                    let err = CacheError::compute(key.as_str(), cause);
                    {
                        let mut state = state.lock();
                        let owned = state.inflight.remove_settled(&key, &sender);
                        if background && owned {
                            // Keep the stale value authoritative; the next
                            // stale read retries the refresh. When the
                            // tracker was replaced, the flag belongs to the
                            // newer refresh and stays.
                            state.store.clear_refreshing(&key);
                        }
                    }
                    if background {
                        warn!(key = %key, error = %err, "background refresh failed; keeping stale value");
                    } else {
                        debug!(key = %key, error = %err, "compute failed; key left unpopulated");
                    }
                    Err(err)
                }
            };

            // No receivers is fine: every waiter may have gone away.
            let _ = sender.send(settled);
        });
    }

    // == Settlement ==
    /// Awaits a broadcast settlement for `key`.
    async fn await_settlement(
        &self,
        key: &str,
        mut receiver: broadcast::Receiver<ComputeResult<T>>,
        joined: bool,
    ) -> Result<CachedValue<T>> {
        match receiver.recv().await {
            Ok(Ok(value)) => Ok(CachedValue {
                value,
                is_fresh: true,
                is_refreshing: joined,
                age_ms: 0,
            }),
            Ok(Err(err)) => {
                // A joined tracker may belong to a background refresh whose
                // stale value is still in the store; readers never observe
                // a crash from a background refresh, so serve that value
                // and only propagate when nothing survives (miss-path
                // failures leave the key absent and still error).
                if joined {
                    if let Some(cached) = self.get(key) {
                        return Ok(cached);
                    }
                }
                Err(err)
            }
            // Sender dropped without settling (task died); the sweep or the
            // next call starts over.
            Err(_) => Err(CacheError::ComputeAbandoned(key.to_string())),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> CacheConfig {
        CacheConfig {
            ttl_ms: 60_000,
            stale_threshold_ms: 20_000,
            max_entries: 100,
            sweep_interval_secs: 60,
            inflight_max_age_ms: 300_000,
        }
    }

    #[tokio::test]
    async fn test_miss_computes_and_populates() {
        let cache: Cache<String> = Cache::new(test_config());

        let result = cache
            .get_or_compute("k", || async { Ok("v1".to_string()) })
            .await
            .unwrap();

        assert_eq!(result.value, "v1");
        assert!(result.is_fresh);
        assert!(!result.is_refreshing);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_compute() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("k", "v1".to_string());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = cache
            .get_or_compute("k", move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async { Ok("v2".to_string()) }
            })
            .await
            .unwrap();

        assert_eq!(result.value, "v1");
        assert!(result.is_fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_sync_compute_failure_propagates_and_leaves_key_absent() {
        let cache: Cache<String> = Cache::new(test_config());

        let result = cache
            .get_or_compute("k", || async { Err(anyhow::anyhow!("backend down")) })
            .await;

        assert!(matches!(result, Err(CacheError::Compute { .. })));
        assert!(cache.get("k").is_none());

        // Next call retries and can succeed.
        let retried = cache
            .get_or_compute("k", || async { Ok("v1".to_string()) })
            .await
            .unwrap();
        assert_eq!(retried.value, "v1");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("k", "v".to_string());

        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_counts_and_spares_others() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("paper:detail:user-1:p1", "a".to_string());
        cache.set("paper:detail:user-1:p2", "b".to_string());
        cache.set("paper:detail:user-12:p1", "c".to_string());

        let removed = cache.invalidate_prefix("paper:detail:user-1:");

        assert_eq!(removed, 2);
        assert!(cache.get("paper:detail:user-12:p1").is_some());
    }

    #[tokio::test]
    async fn test_invalidate_matching_predicate() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("paper:list:user-1", "a".to_string());
        cache.set("paper:detail:user-1:p1", "b".to_string());
        cache.set("paper:list:user-2", "c".to_string());

        let removed = cache.invalidate_matching(|key| key.contains(":user-1"));

        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());

        cache.clear();

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_set_overwrites_and_refreshes_age() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("k", "v1".to_string());
        cache.set("k", "v2".to_string());

        let read = cache.get("k").unwrap();
        assert_eq!(read.value, "v2");
        assert!(read.is_fresh);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_reset() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("k", "v".to_string());
        cache.get("k");
        cache.get("missing");

        cache.reset_stats();

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        // Derived snapshot survives a counter reset
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_sweep_reports_nothing_on_fresh_cache() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set("k", "v".to_string());

        let report = cache.sweep();

        assert!(report.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_entries() {
        let cache: Cache<String> = Cache::new(test_config());
        cache.set_with("k", "v".to_string(), SetOptions { ttl_ms: Some(0) });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let report = cache.sweep();

        assert_eq!(report.expired_removed, 1);
        assert!(cache.is_empty());
    }
}
