//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Missing keys are never an error: lookup operations return `Option`
/// instead. Errors only arise from caller-supplied compute operations,
/// and they are `Clone` so a single failure can be broadcast to every
/// deduplicated waiter.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// A caller-supplied compute operation failed on the synchronous
    /// (miss/expired) path. The key remains unpopulated so the next
    /// call retries.
    #[error("compute failed for key '{key}': {cause}")]
    Compute {
        /// Key the compute was populating
        key: String,
        /// Underlying failure from the compute closure
        cause: Arc<anyhow::Error>,
    },

    /// The tracked compute for this key settled without producing a
    /// result (its task died before broadcasting).
    #[error("compute for key '{0}' was abandoned before producing a result")]
    ComputeAbandoned(String),
}

impl CacheError {
    /// Wraps a compute failure for the given key.
    pub fn compute(key: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Compute {
            key: key.into(),
            cause: Arc::new(cause),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
