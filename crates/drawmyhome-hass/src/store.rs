//! Plan persistence transport
//!
//! Plans are stored as opaque JSON strings keyed by name. The file store keeps
//! every plan in one document shaped like the home-automation storage
//! component: `{"plans": {name: {data, saved_at}}}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store is closed")]
    Closed,
}

/// Remote save/load/list transport for plans
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert or replace a plan
    async fn save(&self, name: &str, data: &str) -> Result<(), StoreError>;

    /// Stored data for a plan. Missing and empty plans are `None`.
    async fn load(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Plan names in sorted order
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove a plan. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, StoreError>;
}

/// One saved plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPlan {
    pub data: String,
    pub saved_at: DateTime<Utc>,
}

/// On-disk document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub plans: BTreeMap<String, StoredPlan>,
}

impl StoreDocument {
    fn upsert(&mut self, name: &str, data: &str) {
        self.plans.insert(
            name.to_string(),
            StoredPlan {
                data: data.to_string(),
                saved_at: Utc::now(),
            },
        );
    }

    fn data(&self, name: &str) -> Option<String> {
        self.plans
            .get(name)
            .map(|plan| plan.data.clone())
            .filter(|data| !data.is_empty())
    }
}

/// Plans kept in a single JSON file
pub struct JsonFilePlanStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: AsyncMutex<()>,
    last_loaded: Mutex<Option<String>>,
}

impl JsonFilePlanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: AsyncMutex::new(()),
            last_loaded: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the plan most recently loaded
    pub fn last_loaded(&self) -> Option<String> {
        self.last_loaded.lock().clone()
    }

    async fn read(&self) -> Result<StoreDocument, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(document)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for JsonFilePlanStore {
    async fn save(&self, name: &str, data: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        document.upsert(name, data);
        self.write(&document).await?;
        info!(plan = %name, path = %self.path.display(), "Saved plan");
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.read().await?.data(name);
        *self.last_loaded.lock() = Some(name.to_string());
        debug!(plan = %name, found = data.is_some(), "Loaded plan");
        Ok(data)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.plans.into_keys().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        let existed = document.plans.remove(name).is_some();
        if existed {
            self.write(&document).await?;
            info!(plan = %name, "Deleted plan");
        }

        let mut last_loaded = self.last_loaded.lock();
        if last_loaded.as_deref() == Some(name) {
            *last_loaded = None;
        }
        Ok(existed)
    }
}

/// Plans kept in memory
#[derive(Default)]
pub struct MemoryPlanStore {
    document: Mutex<StoreDocument>,
    closed: std::sync::atomic::AtomicBool,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every further operation
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn save(&self, name: &str, data: &str) -> Result<(), StoreError> {
        self.check_open()?;
        self.document.lock().upsert(name, data);
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.check_open()?;
        Ok(self.document.lock().data(name))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.check_open()?;
        Ok(self.document.lock().plans.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        self.check_open()?;
        Ok(self.document.lock().plans.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFilePlanStore::new(dir.path().join("nested").join("plans.json"));

        store.save("upstairs", r#"{"paths":[]}"#).await.unwrap();
        store.save("downstairs", r#"{"paths":[1]}"#).await.unwrap();
        store.save("upstairs", r#"{"paths":[2]}"#).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["downstairs", "upstairs"]);
        assert_eq!(
            store.load("upstairs").await.unwrap().as_deref(),
            Some(r#"{"paths":[2]}"#)
        );
        assert_eq!(store.last_loaded().as_deref(), Some("upstairs"));
        assert_eq!(store.load("attic").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plans.json");
        let store = JsonFilePlanStore::new(&path);
        store.save("home", "{}").await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["plans"]["home"]["data"], "{}");
        assert!(raw["plans"]["home"]["saved_at"].is_string());
    }

    #[tokio::test]
    async fn test_empty_plan_is_not_found() {
        let store = MemoryPlanStore::new();
        store.save("blank", "").await.unwrap();
        assert_eq!(store.load("blank").await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec!["blank"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = JsonFilePlanStore::new(dir.path().join("plans.json"));
        store.save("home", "{}").await.unwrap();
        store.load("home").await.unwrap();

        assert!(store.delete("home").await.unwrap());
        assert!(!store.delete("home").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.last_loaded(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plans.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFilePlanStore::new(&path);
        assert!(matches!(store.list().await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_closed_memory_store() {
        let store = MemoryPlanStore::new();
        store.close();
        assert!(matches!(store.save("a", "{}").await, Err(StoreError::Closed)));
    }
}
