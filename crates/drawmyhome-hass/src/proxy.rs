//! Live binding between one device and one external entity

use std::sync::Arc;

use drawmyhome_core::{route_click, Attributes, DeviceColor, DeviceEntity, SharedDevice};
use tracing::{debug, info};

use crate::api::{EntityStateSource, HassError, Subscription};

/// Color shown for an external state value
pub fn state_color(state: &str) -> DeviceColor {
    match state {
        "on" | "open" => DeviceColor::Green,
        "off" | "closed" => DeviceColor::Red,
        _ => DeviceColor::Blue,
    }
}

fn apply_external_state(device: &mut DeviceEntity, state: &str, attributes: &Attributes) {
    device.set_color(state_color(state));
    device.apply_state(state, attributes);
}

/// Mirrors an entity's state onto a device and forwards the device's clicks
#[derive(Debug)]
pub struct DeviceProxy {
    device_id: String,
    entity_id: String,
    device: SharedDevice,
    subscription: Option<Subscription>,
}

impl DeviceProxy {
    /// Bind `device` to `entity_id`.
    ///
    /// The device turns gray, then takes the entity's current state if it
    /// has one. When the subscription fails the device is left as it was.
    /// The device must not be locked by the caller.
    pub fn attach(
        device: SharedDevice,
        entity_id: &str,
        source: &dyn EntityStateSource,
    ) -> Result<Self, HassError> {
        let (device_id, previous_color) = {
            let mut guard = device.lock();
            let previous_color = guard.color();
            guard.set_color(DeviceColor::Gray);
            (guard.id().to_string(), previous_color)
        };

        let weak = Arc::downgrade(&device);
        let subscription = source.subscribe(
            entity_id,
            Arc::new(move |state: &str, attributes: &Attributes| {
                if let Some(device) = weak.upgrade() {
                    apply_external_state(&mut device.lock(), state, attributes);
                }
            }),
        );
        let subscription = match subscription {
            Ok(subscription) => subscription,
            Err(e) => {
                if let (Some(color), Some(visual)) = (previous_color, device.lock().visual_mut()) {
                    visual.set_color(color);
                }
                return Err(e);
            }
        };
        device.lock().set_on_click(Arc::new(route_click));

        info!(device = %device_id, entity = %entity_id, "Device bound to entity");
        Ok(Self {
            device_id,
            entity_id: entity_id.to_string(),
            device,
            subscription: Some(subscription),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    /// Whether the state subscription is still live
    pub fn is_attached(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Release the subscription only, leaving the device untouched
    pub fn release(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Release the subscription and reset the device to gray. Safe to repeat.
    pub fn detach(&mut self) {
        self.release();
        let mut device = self.device.lock();
        device.clear_on_click();
        device.set_color(DeviceColor::Gray);
        debug!(device = %self.device_id, entity = %self.entity_id, "Device proxy detached");
    }
}
