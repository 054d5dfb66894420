//! Device construction with placeholder visuals and asynchronous asset swap

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::device::{shared, DeviceEntity, DeviceKind, SharedDevice};
use crate::model::FloorplanModel;
use crate::visual::{PointLight, Visual};

/// Default asset backing switch devices
pub const DEFAULT_SWITCH_ASSET: &str = "switch.glb";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of richer device visuals
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<Visual, AssetError>;
}

/// Resolves assets as model files under a directory
#[derive(Debug, Clone)]
pub struct ModelDirLoader {
    root: PathBuf,
}

impl ModelDirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Bare names live under the root. Saved references already carry it.
    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() || path.starts_with(&self.root) {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl AssetLoader for ModelDirLoader {
    async fn load(&self, name: &str) -> Result<Visual, AssetError> {
        let path = self.resolve(name);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssetError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        debug!(path = %path.display(), "Loaded device asset");
        Ok(Visual::asset(&path.to_string_lossy()))
    }
}

/// Immediate visual for a device kind
pub fn placeholder(kind: DeviceKind) -> Visual {
    match kind {
        DeviceKind::Switch => Visual::cube(0.5, 0xff8888),
        DeviceKind::Light => Visual::sphere(0.3, 0x888888).with_light(PointLight {
            color: 0xffaa00,
            intensity: 0.0,
            distance: 2.0,
        }),
        DeviceKind::Sensor => Visual::cylinder(0.2, 0.1, 0x4caf50),
        DeviceKind::Generic => Visual::cube(0.4, 0x9e9e9e),
    }
}

/// Builds devices from type labels
#[derive(Clone)]
pub struct DeviceFactory {
    loader: Option<Arc<dyn AssetLoader>>,
    switch_asset: String,
}

impl DeviceFactory {
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            loader: Some(loader),
            switch_asset: DEFAULT_SWITCH_ASSET.to_string(),
        }
    }

    /// A factory that only ever produces placeholders
    pub fn without_assets() -> Self {
        Self {
            loader: None,
            switch_asset: DEFAULT_SWITCH_ASSET.to_string(),
        }
    }

    pub fn with_switch_asset(mut self, name: &str) -> Self {
        self.switch_asset = name.to_string();
        self
    }

    /// Create a device. Never fails: unknown labels get the generic visual.
    pub fn create(&self, label: &str) -> SharedDevice {
        self.create_tracked(label).0
    }

    /// Create a device and return the pending asset swap, if one was started
    pub fn create_tracked(&self, label: &str) -> (SharedDevice, Option<JoinHandle<()>>) {
        let kind = DeviceKind::from_label(label).unwrap_or_else(|| {
            warn!(label = %label, "Unknown device type, using generic visual");
            DeviceKind::Generic
        });

        let id = format!("{}_{}", label.to_lowercase(), Uuid::new_v4().simple());
        let mut device = DeviceEntity::new(id, kind);
        device.set_visual(placeholder(kind));
        info!(device = %device.id(), kind = %kind, "Created device");

        let device = shared(device);
        let pending = match kind {
            DeviceKind::Switch => self.spawn_asset_swap(&device, self.switch_asset.clone()),
            _ => None,
        };
        (device, pending)
    }

    /// Load the referenced asset of every device of a rebuilt plan still
    /// showing its placeholder
    pub fn restore_assets(&self, model: &FloorplanModel) -> Vec<JoinHandle<()>> {
        model
            .devices()
            .iter()
            .filter_map(|device| {
                let asset = {
                    let guard = device.lock();
                    guard
                        .asset_ref()
                        .filter(|_| guard.awaits_asset())
                        .map(str::to_string)
                }?;
                self.spawn_asset_swap(device, asset)
            })
            .collect()
    }

    fn spawn_asset_swap(&self, device: &SharedDevice, asset: String) -> Option<JoinHandle<()>> {
        let loader = self.loader.clone()?;
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime, keeping placeholder visual");
                return None;
            }
        };

        let weak = Arc::downgrade(device);
        Some(runtime.spawn(async move {
            let visual = match loader.load(&asset).await {
                Ok(visual) => visual,
                Err(e) => {
                    error!(asset = %asset, error = %e, "Failed to load device asset, keeping placeholder");
                    return;
                }
            };

            match weak.upgrade() {
                Some(device) => {
                    let mut device = device.lock();
                    device.swap_visual(visual);
                    debug!(device = %device.id(), asset = %asset, "Swapped in device asset");
                }
                None => debug!(asset = %asset, "Device dropped before its asset loaded"),
            }
        }))
    }
}
