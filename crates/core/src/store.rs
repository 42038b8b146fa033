//! Lease/cache store contract.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Key/value store with per-key TTLs.
///
/// Every call is individually atomic; nothing here spans more than one key.
/// Implementations do not retry internally beyond what their client does.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value with no expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Store a value that expires after `ttl_secs` seconds.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Store a value with a TTL only if `key` is currently absent.
    ///
    /// Returns `true` when this call wrote the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Whether `key` is currently present.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}
