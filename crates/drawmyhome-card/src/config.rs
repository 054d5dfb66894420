//! Card configuration loading

use std::path::Path;

use anyhow::Result;
use drawmyhome_scene::WallConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardConfig {
    /// Plan loaded as soon as the plan list is known
    #[serde(default)]
    pub default_plan: Option<String>,
    /// Entities offered when linking a device. Empty offers every entity.
    #[serde(default)]
    pub entities: Vec<EntityRef>,
    /// Devices created and linked when the card is configured
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub walls: WallConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// An entity entry, either `"light.kitchen"` or `{ entity = "light.kitchen" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Entry { entity: String },
}

impl EntityRef {
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Entry { entity } => entity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device type label (`switch`, `light`, `sensor`)
    #[serde(rename = "type")]
    pub device_type: String,
    pub entity_id: String,
    /// Asset override for the device visual
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding device model files
    #[serde(default = "default_models_path")]
    pub path: String,
    /// Model file used for switches
    #[serde(default = "default_switch_model")]
    pub switch: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            path: default_models_path(),
            switch: default_switch_model(),
        }
    }
}

fn default_models_path() -> String {
    "./www/models3d".to_string()
}

fn default_switch_model() -> String {
    "switch.glb".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Plan store file
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Bound on a single store call in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_storage_path() -> String {
    "./draw_my_home.json".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Render loop period in milliseconds
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
        }
    }
}

fn default_frame_interval() -> u64 {
    16
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<CardConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: CardConfig = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(CardConfig::default())
    }
}

/// Save an example configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = CardConfig {
        default_plan: Some("home".to_string()),
        entities: vec![
            EntityRef::Id("light.living_room".to_string()),
            EntityRef::Entry {
                entity: "switch.kitchen".to_string(),
            },
        ],
        devices: vec![DeviceConfig {
            device_type: "light".to_string(),
            entity_id: "light.living_room".to_string(),
            url: None,
        }],
        ..CardConfig::default()
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
