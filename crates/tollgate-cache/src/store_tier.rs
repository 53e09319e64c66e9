use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tollgate_core::{CacheEntry, CacheTier, DurableStore, TollgateError};

/// Cache tier backed by a [`DurableStore`]. The shared (medium) and durable
/// (slow) layers are both this type over different stores and TTLs.
///
/// Entries are serialized as JSON under `cache/<name>/<key>`. The store has
/// no delete, so lazy expiry simply reports a miss; the slot is reclaimed by
/// the next write-through.
pub struct StoreTier {
    name: &'static str,
    ttl: Duration,
    store: Arc<dyn DurableStore>,
}

impl StoreTier {
    pub fn new(name: &'static str, ttl: Duration, store: Arc<dyn DurableStore>) -> Self {
        Self { name, ttl, store }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("cache/{}/{}", self.name, key)
    }
}

#[async_trait]
impl CacheTier for StoreTier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, TollgateError> {
        let value = match self.store.read(&self.storage_key(key)).await? {
            Some(value) => value,
            None => return Ok(None),
        };
        let entry: CacheEntry = serde_json::from_value(value)
            .map_err(|e| TollgateError::Cache(format!("corrupt entry in {} tier: {e}", self.name)))?;
        if entry.is_expired() {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), TollgateError> {
        let entry = CacheEntry::new(key, value.to_vec(), self.ttl);
        let json = serde_json::to_value(&entry)
            .map_err(|e| TollgateError::Cache(format!("serialize entry: {e}")))?;
        self.store.write(&self.storage_key(key), json).await
    }
}
