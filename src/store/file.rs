//! JSON-file-backed property store.
//!
//! The full record map lives in memory; every mutation is flushed by
//! serializing to a temporary file in the same directory and atomically
//! renaming it over the live file. A sidecar advisory lock guards the
//! store against a second process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;

use crate::domain::ContentRecord;

use super::{PropertyStore, StoreError};

/// Crash-safe property store persisted as a single JSON document
pub struct JsonFileStore {
    /// Path to the live store file
    path: PathBuf,

    /// In-memory copy of the record map; the file is the durable copy
    records: Mutex<HashMap<String, ContentRecord>>,

    /// Advisory lock held for the lifetime of the store.
    /// The sidecar is locked instead of the store file because the
    /// atomic rename replaces the store file's inode on every flush.
    _lock: std::fs::File,
}

impl JsonFileStore {
    /// Open or create a store at the given path
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let lock = Self::acquire_lock(&path)?;

        let records = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
            _lock: lock,
        })
    }

    /// Get the path of the live store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<std::fs::File, StoreError> {
        let lock_path = lock_path_for(path);
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;

        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path.display().to_string()))?;

        Ok(lock)
    }

    /// Flush the in-memory map to disk. Callers hold the records lock.
    async fn flush(&self, records: &HashMap<String, ContentRecord>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(records)?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).await?;
        fs::rename(&staging, &self.path).await?;

        Ok(())
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

#[async_trait]
impl PropertyStore for JsonFileStore {
    async fn get(&self, identifier: &str) -> Result<Option<ContentRecord>, StoreError> {
        Ok(self.records.lock().await.get(identifier).cloned())
    }

    async fn set(&self, identifier: &str, record: ContentRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.insert(identifier.to_string(), record);
        self.flush(&records).await
    }

    async fn remove(&self, identifier: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.remove(identifier).is_some() {
            self.flush(&records).await?;
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OfflineState;
    use tempfile::TempDir;

    fn record(state: OfflineState) -> ContentRecord {
        ContentRecord::new(
            "episode",
            state,
            serde_json::json!({"version": 1, "source": "demo", "episode": 1}),
        )
    }

    #[tokio::test]
    async fn test_set_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("contents.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.set("demo-ep-1", record(OfflineState::Preserved)).await.unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        let restored = store.get("demo-ep-1").await.unwrap().unwrap();
        assert_eq!(restored.state, OfflineState::Preserved);
    }

    #[tokio::test]
    async fn test_remove_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("contents.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.set("a", record(OfflineState::Ready)).await.unwrap();
            store.set("b", record(OfflineState::Ready)).await.unwrap();
            store.remove("a").await.unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_staging_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("contents.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.set("a", record(OfflineState::Ready)).await.unwrap();
        }

        // A crash between write and rename leaves a staging file behind
        fs::write(path.with_extension("json.tmp"), "{ garbage")
            .await
            .unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_open_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("contents.json");

        let _store = JsonFileStore::open(&path).await.unwrap();
        let second = JsonFileStore::open(&path).await;

        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[tokio::test]
    async fn test_empty_store_enumerates_nothing() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path().join("contents.json"))
            .await
            .unwrap();

        assert!(store.all().await.unwrap().is_empty());
    }
}
