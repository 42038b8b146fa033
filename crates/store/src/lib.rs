//! Store backends for leases and the response cache.

use std::sync::Arc;

use tracing::info;

use leasehold_core::config::StoreConfig;
use leasehold_core::{Clock, LeaseStore, StoreError};

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Build the backend named by `config.backend`.
///
/// `clock` only matters for the memory backend; Redis keeps its own time.
pub async fn connect(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn LeaseStore>, StoreError> {
    match config.backend.as_str() {
        "redis" => Ok(Arc::new(RedisStore::connect(&config.redis_url).await?)),
        "memory" => {
            info!("using in-memory store (leases are not shared between processes)");
            Ok(Arc::new(MemoryStore::with_clock(clock)))
        }
        other => Err(StoreError::Unavailable(format!(
            "unknown store backend '{}' (supported: redis, memory)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasehold_core::SystemClock;

    #[tokio::test]
    async fn connect_memory_backend() {
        let config = StoreConfig {
            backend: "memory".to_string(),
            redis_url: String::new(),
        };
        let store = connect(&config, Arc::new(SystemClock)).await.unwrap();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn connect_unknown_backend() {
        let config = StoreConfig {
            backend: "etcd".to_string(),
            redis_url: String::new(),
        };
        let err = connect(&config, Arc::new(SystemClock)).await.err().unwrap();
        assert!(err.to_string().contains("etcd"));
    }
}
