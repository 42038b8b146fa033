use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::store::{LeaseStore, StoreError};

/// TTL-less map store for unit tests inside this crate.
#[derive(Debug, Default)]
pub(crate) struct MapStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl LeaseStore for MapStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        self.set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
