//! Registry of device proxies, one per linked device

use std::collections::HashMap;
use std::sync::Arc;

use drawmyhome_core::SharedDevice;
use tracing::{debug, info};

use crate::api::{EntityStateSource, HassError};
use crate::proxy::DeviceProxy;

/// Invoked after a link so the host can persist the plan
pub type SaveCallback = Arc<dyn Fn(&SharedDevice) + Send + Sync>;

/// Creates and tears down the live bindings of devices
pub struct DeviceAdapter {
    source: Arc<dyn EntityStateSource>,
    proxies: HashMap<String, DeviceProxy>,
    save_callback: Option<SaveCallback>,
}

impl DeviceAdapter {
    pub fn new(source: Arc<dyn EntityStateSource>) -> Self {
        Self {
            source,
            proxies: HashMap::new(),
            save_callback: None,
        }
    }

    pub fn source(&self) -> &Arc<dyn EntityStateSource> {
        &self.source
    }

    pub fn set_save_callback(&mut self, callback: SaveCallback) {
        self.save_callback = Some(callback);
    }

    /// Link a device to an entity.
    ///
    /// The new proxy is attached before any proxy already registered for the
    /// device is released, so a failed link leaves the previous binding and
    /// entity reference in place. A device never holds two live subscriptions.
    pub fn link(&mut self, device: &SharedDevice, entity_id: &str, save: bool) -> Result<(), HassError> {
        let device_id = device.lock().id().to_string();
        let proxy = DeviceProxy::attach(device.clone(), entity_id, self.source.as_ref())?;

        if let Some(mut previous) = self.proxies.remove(&device_id) {
            debug!(device = %device_id, entity = %previous.entity_id(), "Replacing existing proxy");
            previous.release();
        }
        device.lock().set_entity_id(entity_id);
        self.proxies.insert(device_id.clone(), proxy);
        info!(device = %device_id, entity = %entity_id, "Linked device");

        if save {
            if let Some(callback) = &self.save_callback {
                callback(device);
            }
        }
        Ok(())
    }

    /// Unlink a device: release its subscription and drop the entity reference
    pub fn unlink(&mut self, device_id: &str) -> bool {
        let Some(mut proxy) = self.proxies.remove(device_id) else {
            return false;
        };
        proxy.detach();
        proxy.device().lock().unlink();
        info!(device = %device_id, "Unlinked device");
        true
    }

    /// Detach every proxy, keeping the devices' entity references
    pub fn detach_all(&mut self) {
        let count = self.proxies.len();
        for (_, mut proxy) in self.proxies.drain() {
            proxy.detach();
        }
        if count > 0 {
            info!(count, "Detached all device proxies");
        }
    }

    pub fn proxy(&self, device_id: &str) -> Option<&DeviceProxy> {
        self.proxies.get(device_id)
    }

    pub fn is_linked(&self, device_id: &str) -> bool {
        self.proxies.contains_key(device_id)
    }

    /// Number of registered proxies
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

impl Drop for DeviceAdapter {
    fn drop(&mut self) {
        self.detach_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{EntityState, StateHub};
    use drawmyhome_core::{DeviceColor, DeviceFactory};
    use parking_lot::Mutex;

    fn setup() -> (Arc<StateHub>, DeviceAdapter) {
        let hub = Arc::new(StateHub::new());
        let adapter = DeviceAdapter::new(hub.clone());
        (hub, adapter)
    }

    #[tokio::test]
    async fn test_link_then_unlink_lifecycle() {
        let (hub, mut adapter) = setup();
        let device = DeviceFactory::without_assets().create("switch");
        let id = device.lock().id().to_string();

        adapter.link(&device, "switch.fan", false).unwrap();
        assert_eq!(hub.active_subscriptions(), 1);
        assert!(adapter.is_linked(&id));
        assert_eq!(device.lock().entity_id(), Some("switch.fan"));

        assert!(adapter.unlink(&id));
        assert_eq!(hub.active_subscriptions(), 0);
        assert!(!adapter.unlink(&id));
        assert_eq!(device.lock().entity_id(), None);
        assert_eq!(device.lock().color(), Some(DeviceColor::Gray.hex()));
    }

    #[tokio::test]
    async fn test_relink_replaces_proxy() {
        let (hub, mut adapter) = setup();
        hub.set_state(EntityState::new("light.b", "off"));
        let device = DeviceFactory::without_assets().create("light");
        let id = device.lock().id().to_string();

        adapter.link(&device, "light.a", false).unwrap();
        adapter.link(&device, "light.b", false).unwrap();

        assert_eq!(hub.active_subscriptions(), 1);
        assert_eq!(adapter.len(), 1);
        assert_eq!(adapter.proxy(&id).unwrap().entity_id(), "light.b");
        assert_eq!(device.lock().color(), Some(DeviceColor::Red.hex()));
    }

    #[tokio::test]
    async fn test_save_callback_only_when_requested() {
        let (_hub, mut adapter) = setup();
        let saved = Arc::new(Mutex::new(Vec::new()));
        let sink = saved.clone();
        adapter.set_save_callback(Arc::new(move |device: &SharedDevice| {
            sink.lock().push(device.lock().id().to_string());
        }));

        let device = DeviceFactory::without_assets().create("sensor");
        adapter.link(&device, "sensor.temp", false).unwrap();
        assert!(saved.lock().is_empty());
        adapter.link(&device, "sensor.temp", true).unwrap();
        assert_eq!(saved.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_detach_all_keeps_links() {
        let (hub, mut adapter) = setup();
        let factory = DeviceFactory::without_assets();
        let a = factory.create("light");
        let b = factory.create("switch");
        adapter.link(&a, "light.a", false).unwrap();
        adapter.link(&b, "switch.b", false).unwrap();
        assert_eq!(hub.active_subscriptions(), 2);

        adapter.detach_all();
        assert_eq!(hub.active_subscriptions(), 0);
        assert!(adapter.is_empty());
        assert_eq!(a.lock().entity_id(), Some("light.a"));
    }

    #[tokio::test]
    async fn test_link_fails_when_disconnected() {
        let (hub, mut adapter) = setup();
        hub.set_connected(false);
        let device = DeviceFactory::without_assets().create("light");
        assert!(matches!(
            adapter.link(&device, "light.a", true),
            Err(HassError::NotConnected)
        ));
        assert!(adapter.is_empty());
        assert_eq!(device.lock().entity_id(), None);
    }

    #[tokio::test]
    async fn test_failed_relink_keeps_previous_binding() {
        let (hub, mut adapter) = setup();
        hub.set_state(EntityState::new("light.a", "on"));
        let device = DeviceFactory::without_assets().create("light");
        let id = device.lock().id().to_string();
        adapter.link(&device, "light.a", false).unwrap();

        hub.set_connected(false);
        assert!(adapter.link(&device, "light.b", false).is_err());

        assert_eq!(device.lock().entity_id(), Some("light.a"));
        assert_eq!(adapter.proxy(&id).unwrap().entity_id(), "light.a");
        assert!(adapter.proxy(&id).unwrap().is_attached());
        assert!(device.lock().has_click_handler());
        assert_eq!(device.lock().color(), Some(DeviceColor::Green.hex()));
        assert_eq!(hub.active_subscriptions(), 1);
    }
}
