//! swr_cache - An in-process stale-while-revalidate cache
//!
//! Sits in front of expensive, caller-supplied asynchronous lookups and
//! provides TTL expiry, stale-while-revalidate reads, deduplication of
//! concurrent computes, LRU capacity eviction and pattern-based bulk
//! invalidation. Single-process and in-memory; the cache has no knowledge
//! of what is being cached.
//!
//! # Example
//!
//! ```no_run
//! use swr_cache::{Cache, CacheConfig, KeySpace};
//!
//! # async fn demo() -> swr_cache::Result<()> {
//! let cache: Cache<Vec<String>> = Cache::new(CacheConfig::from_env());
//! let sweeper = swr_cache::spawn_sweep_task(cache.clone());
//!
//! let keys = KeySpace::new("paper");
//! let read = cache
//!     .get_or_compute(&keys.key("list", "user-1"), || async {
//!         // expensive lookup
//!         Ok(vec!["p1".to_string(), "p2".to_string()])
//!     })
//!     .await?;
//! assert!(read.is_fresh);
//!
//! // After a mutation, drop everything user-1 owns.
//! cache.invalidate_matching(keys.scope_matcher("user-1"));
//! drop(sweeper);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod tasks;

pub use cache::{Cache, CachedValue, CacheStats, ComputeOptions, Freshness, SetOptions, SweepReport};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use keys::KeySpace;
pub use tasks::{spawn_sweep_task, SweepGuard};
