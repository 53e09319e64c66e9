use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tollgate_core::{DurableStore, TollgateError};

/// In-memory [`DurableStore`] for tests and single-process deployments.
///
/// Last write wins; keys are flat strings. Durable backends (Redis, SQL)
/// implement the same two-method trait externally.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, TollgateError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), TollgateError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
