//! Persistent property store: identifier → content record.
//!
//! The store is the durable side of the content pool. Implementations
//! must guarantee that a `set` either fully lands or is not observed
//! after an unexpected termination; no ordering is guaranteed across
//! keys.

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ContentRecord;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Errors from property store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store is locked by another process: {0}")]
    Locked(String),
}

/// Durable key/value mapping from content identifier to record
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Fetch the record for an identifier
    async fn get(&self, identifier: &str) -> Result<Option<ContentRecord>, StoreError>;

    /// Write the record for an identifier
    async fn set(&self, identifier: &str, record: ContentRecord) -> Result<(), StoreError>;

    /// Remove the record for an identifier
    async fn remove(&self, identifier: &str) -> Result<(), StoreError>;

    /// Enumerate all records
    async fn all(&self) -> Result<Vec<(String, ContentRecord)>, StoreError>;
}
