//! Background Tasks Module
//!
//! Tasks that run periodically for the lifetime of a cache instance.
//!
//! # Tasks
//! - Sweep: evicts TTL-expired entries and hung in-flight trackers at a
//!   configured interval; stopped deterministically via its guard.

mod sweep;

pub use sweep::{spawn_sweep_task, SweepGuard};
