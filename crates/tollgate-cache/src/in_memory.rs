use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tollgate_core::{CacheEntry, CacheTier, TollgateError};

/// Volatile in-process cache tier with TTL expiry and an optional entry cap.
///
/// When the cap is reached, the oldest entry by `written_at` is evicted
/// before insertion. Expiry is checked lazily at read time.
pub struct InMemoryTier {
    name: &'static str,
    ttl: Duration,
    max_entries: Option<usize>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryTier {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            max_entries: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cap the tier at `max_entries` live entries.
    pub fn with_max_entries(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            ttl,
            max_entries: Some(max_entries),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheTier for InMemoryTier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, TollgateError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop it under the write lock so the map stays bounded.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), TollgateError> {
        let mut entries = self.entries.write().await;
        if let Some(cap) = self.max_entries {
            if !entries.contains_key(key) && entries.len() >= cap {
                let oldest = entries
                    .values()
                    .min_by_key(|e| e.written_at)
                    .map(|e| e.key.clone());
                if let Some(oldest_key) = oldest {
                    entries.remove(&oldest_key);
                }
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry::new(key, value.to_vec(), self.ttl),
        );
        Ok(())
    }
}
