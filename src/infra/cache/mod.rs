//! Byte-oriented cache clients for read acceleration.

pub mod client;
pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use redis::RedisError;
use thiserror::Error;

pub use client::RedisCache;
pub use mock::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation timed out")]
    Timeout,
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            CacheError::Timeout
        } else {
            CacheError::Unavailable(err.to_string())
        }
    }
}

/// Cache operations used by read accelerators. Failures are expected to be
/// absorbed by callers; a broken cache degrades reads, it does not fail them.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetches a key. `None` means absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores a value under `key` with a relative TTL.
    async fn set_ex(&self, key: &str, value: Bytes, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Removes a key. Removing an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}
