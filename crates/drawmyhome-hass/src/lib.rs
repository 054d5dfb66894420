//! Draw My Home HASS - Home-automation binding and plan persistence
//!
//! This crate connects floorplan devices to the outside world:
//! - The external entity state source contract and an in-process hub
//! - Device proxies that mirror entity state onto device visuals
//! - The adapter that owns one proxy per linked device
//! - Plan stores and the file manager that loads and saves floorplans

pub mod adapter;
pub mod api;
pub mod file_manager;
pub mod proxy;
pub mod store;

pub use adapter::{DeviceAdapter, SaveCallback};
pub use api::{
    EntityState, EntityStateSource, HassError, ServiceCall, StateCallback, StateChanged, StateHub,
    Subscription,
};
pub use file_manager::FloorplanFileManager;
pub use proxy::{state_color, DeviceProxy};
pub use store::{JsonFilePlanStore, MemoryPlanStore, PlanStore, StoreDocument, StoreError, StoredPlan};
