//! Draw My Home Card - The floorplan editor
//!
//! This crate assembles the editor the dashboard card hosts:
//! - Card configuration loading (TOML)
//! - The entity catalog offered when linking a device
//! - The editor controller driving tools, views, placement and plans

pub mod catalog;
pub mod config;
pub mod editor;

pub use catalog::{EntityCatalog, EntityChoice};
pub use config::{
    load_config, save_default_config, CardConfig, DeviceConfig, EntityRef, ModelsConfig,
    SessionConfig, StorageConfig,
};
pub use editor::{CardError, FloorplanEditor, ViewMode};
