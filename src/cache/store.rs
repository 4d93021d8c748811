//! Key-Value Store Module
//!
//! The seam between the cache adapter and whatever holds the bytes.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

// == Cache Error ==
/// Failure of the underlying store. Never surfaced past [`CacheAdapter`](super::CacheAdapter).
#[derive(Error, Debug)]
pub enum CacheError {
    /// No connection was ever established
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// The round trip exceeded the configured bound
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store reported an error for this operation
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            CacheError::Unavailable(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

// == Key-Value Store ==
/// Get and set-with-expiry over string values.
///
/// Implementations must be safe for concurrent use. Each call is atomic at
/// single-key granularity; no cross-key guarantees are required.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the live value for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, expiring `ttl` after the write.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Short name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Releases the connection. Called once at shutdown.
    async fn close(&self) {}
}
