//! In-memory property store for tests and ephemeral use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ContentRecord;

use super::{PropertyStore, StoreError};

/// Property store backed by a plain in-memory map
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ContentRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn get(&self, identifier: &str) -> Result<Option<ContentRecord>, StoreError> {
        Ok(self.records.lock().await.get(identifier).cloned())
    }

    async fn set(&self, identifier: &str, record: ContentRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(identifier.to_string(), record);
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(identifier);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(String, ContentRecord)>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}
