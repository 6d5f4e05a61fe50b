//! Periodic Sweep Task
//!
//! Background task that periodically evicts TTL-expired entries and drops
//! in-flight trackers whose compute never settled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

// == Sweep Guard ==
/// Handle to a running sweep task.
///
/// Dropping the guard aborts the task, so tying it to the lifetime of the
/// component that owns the cache gives deterministic teardown.
#[derive(Debug)]
pub struct SweepGuard {
    handle: JoinHandle<()>,
}

impl SweepGuard {
    /// Stops the sweep task immediately.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// True once the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// == Spawn ==
/// Spawns the periodic sweep for `cache`, using the interval from the
/// cache's configuration.
///
/// The task loops forever: sleep for the interval, then run one
/// [`Cache::sweep`] pass and log what it removed. Must be called from
/// within a tokio runtime.
pub fn spawn_sweep_task<T: Clone + Send + 'static>(cache: Cache<T>) -> SweepGuard {
    let interval = Duration::from_secs(cache.config().sweep_interval_secs);

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "starting cache sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let report = cache.sweep();
            if report.is_empty() {
                debug!("sweep pass: nothing to remove");
            } else {
                info!(
                    expired_removed = report.expired_removed,
                    inflight_removed = report.inflight_removed,
                    "sweep pass removed entries"
                );
            }
        }
    });

    SweepGuard { handle }
}
