//! Cache Module
//!
//! In-process stale-while-revalidate caching: TTL expiry, LRU eviction,
//! deduplicated computes and pattern invalidation.

mod engine;
mod entry;
mod inflight;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use engine::{Cache, CachedValue, ComputeOptions, SetOptions, SweepReport};
pub use entry::{current_timestamp_ms, CacheEntry, Freshness};
pub use inflight::{ComputeResult, InFlightTable};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::CacheStore;
