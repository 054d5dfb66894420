//! Floorplan save/load on top of a plan store
//!
//! Every store call is bounded by a timeout. Loading never fails: a missing,
//! empty, corrupt or late plan resolves to `None` and is logged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use drawmyhome_core::FloorplanModel;
use tracing::{error, info, warn};

use crate::store::{PlanStore, StoreError};

/// Default bound on a single store call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct FloorplanFileManager {
    store: Arc<dyn PlanStore>,
    timeout: Duration,
}

impl FloorplanFileManager {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    /// Serialize and store a plan
    pub async fn save(&self, name: &str, model: &FloorplanModel) -> Result<(), StoreError> {
        let data = serde_json::to_string(&model.to_record())?;
        self.bounded(self.store.save(name, &data))
            .await
            .inspect_err(|e| error!(plan = %name, error = %e, "Failed to save plan"))
    }

    /// Load and rehydrate a plan, `None` when it is not available
    pub async fn load(&self, name: &str) -> Option<FloorplanModel> {
        let data = match self.bounded(self.store.load(name)).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!(plan = %name, "Plan not found");
                return None;
            }
            Err(e) => {
                error!(plan = %name, error = %e, "Failed to load plan");
                return None;
            }
        };

        match FloorplanModel::from_json(&data) {
            Ok(model) => {
                info!(
                    plan = %name,
                    segments = model.segments().len(),
                    devices = model.devices().len(),
                    "Loaded plan"
                );
                Some(model)
            }
            Err(e) => {
                error!(plan = %name, error = %e, "Failed to parse plan data");
                None
            }
        }
    }

    /// Saved plan names, sorted
    pub async fn saved_plans(&self) -> Result<Vec<String>, StoreError> {
        self.bounded(self.store.list()).await
    }

    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        self.bounded(self.store.delete(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPlanStore;
    use async_trait::async_trait;
    use drawmyhome_core::{DeviceFactory, Segment};

    /// A store that never answers
    struct StalledStore;

    #[async_trait]
    impl PlanStore for StalledStore {
        async fn save(&self, _: &str, _: &str) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn load(&self, _: &str) -> Result<Option<String>, StoreError> {
            std::future::pending().await
        }
        async fn list(&self) -> Result<Vec<String>, StoreError> {
            std::future::pending().await
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            std::future::pending().await
        }
    }

    fn manager() -> (Arc<MemoryPlanStore>, FloorplanFileManager) {
        let store = Arc::new(MemoryPlanStore::new());
        (store.clone(), FloorplanFileManager::new(store))
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_store, manager) = manager();
        let mut model = FloorplanModel::new();
        model.add_segment(Segment::new(0.0, 0.0, 10.0, 10.0));
        model.add_device(DeviceFactory::without_assets().create("light"));

        manager.save("home", &model).await.unwrap();
        let loaded = manager.load("home").await.unwrap();
        assert_eq!(loaded.segments(), model.segments());
        assert_eq!(loaded.devices().len(), 1);
        assert_eq!(manager.saved_plans().await.unwrap(), vec!["home"]);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_are_none() {
        let (store, manager) = manager();
        assert!(manager.load("nope").await.is_none());

        store.save("broken", "{{{").await.unwrap();
        assert!(manager.load("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_closed_store_load_is_none() {
        let (store, manager) = manager();
        store.close();
        assert!(manager.load("home").await.is_none());
        assert!(matches!(
            manager.save("home", &FloorplanModel::new()).await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_timeouts() {
        let manager =
            FloorplanFileManager::new(Arc::new(StalledStore)).with_timeout(Duration::from_millis(10));
        assert!(manager.load("home").await.is_none());
        assert!(matches!(
            manager.saved_plans().await,
            Err(StoreError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_store, manager) = manager();
        manager.save("home", &FloorplanModel::new()).await.unwrap();
        assert!(manager.delete("home").await.unwrap());
        assert!(manager.saved_plans().await.unwrap().is_empty());
    }
}
