//! Device entities placed in the 3D floorplan

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::surface::SurfaceEvents;
use crate::visual::{Shape, Visual};

/// A device shared between the plan, the scene session and entity bindings
pub type SharedDevice = Arc<Mutex<DeviceEntity>>;

/// External entity attributes as delivered with a state update
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Caller-supplied click behavior, replacing the default routing
pub type ClickHandler = Arc<dyn Fn(&DeviceClick, &SurfaceEvents) + Send + Sync>;

/// Wrap a device for sharing
pub fn shared(device: DeviceEntity) -> SharedDevice {
    Arc::new(Mutex::new(device))
}

/// Recognized device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Switch,
    Light,
    Sensor,
    /// Fallback for unrecognized type labels
    Generic,
}

impl DeviceKind {
    /// Parse a type label case-insensitively
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "switch" => Some(Self::Switch),
            "light" => Some(Self::Light),
            "sensor" => Some(Self::Sensor),
            _ => None,
        }
    }

    /// Derive the kind from a `{type}_{suffix}` device id
    pub fn from_device_id(id: &str) -> Self {
        id.split_once('_')
            .and_then(|(label, _)| Self::from_label(label))
            .unwrap_or(Self::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Light => "light",
            Self::Sensor => "sensor",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named visual states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceColor {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Gray,
    Amber,
}

impl DeviceColor {
    pub fn hex(&self) -> u32 {
        match self {
            Self::Red => 0xff0000,
            Self::Green => 0x00ff00,
            Self::Blue => 0x75bae9,
            Self::Yellow => 0xffff00,
            Self::Purple => 0x800080,
            Self::Gray => 0x888888,
            Self::Amber => 0xffbf00,
        }
    }
}

impl FromStr for DeviceColor {
    type Err = std::convert::Infallible;

    /// Unknown names map to gray
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "red" => Self::Red,
            "green" => Self::Green,
            "blue" => Self::Blue,
            "yellow" => Self::Yellow,
            "purple" => Self::Purple,
            "amber" => Self::Amber,
            _ => Self::Gray,
        })
    }
}

/// What a click on a device resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceClick {
    pub device_id: String,
    pub entity_id: Option<String>,
}

/// Default click routing: linked devices open the entity detail, unlinked ones ask for a link
pub fn route_click(click: &DeviceClick, surface: &SurfaceEvents) {
    match &click.entity_id {
        Some(entity_id) => surface.open_entity_detail(entity_id),
        None => surface.request_entity_selection(&click.device_id),
    }
}

/// Run the click protocol on a shared device and report what it resolved to.
///
/// The device is unlocked while the handler runs, so handlers may lock it.
pub fn dispatch_click(device: &SharedDevice, surface: &SurfaceEvents) -> DeviceClick {
    let (click, handler) = device.lock().resolve_click();
    debug!(device = %click.device_id, "Device clicked");
    match handler {
        Some(handler) => handler(&click, surface),
        None => route_click(&click, surface),
    }
    click
}

/// A device marker in the floorplan
pub struct DeviceEntity {
    id: String,
    kind: DeviceKind,
    visual: Option<Visual>,
    position: Option<Point3<f64>>,
    rotation: Option<Vector3<f64>>,
    /// Asset the visual comes from, kept while a placeholder stands in
    asset: Option<String>,
    entity_id: Option<String>,
    on_click: Option<ClickHandler>,
}

impl DeviceEntity {
    /// Create a device without a visual
    pub fn new(id: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            visual: None,
            position: None,
            rotation: None,
            asset: None,
            entity_id: None,
            on_click: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn visual(&self) -> Option<&Visual> {
        self.visual.as_ref()
    }

    pub fn visual_mut(&mut self) -> Option<&mut Visual> {
        self.visual.as_mut()
    }

    /// Install a visual, replacing any previous one without carrying state over
    pub fn set_visual(&mut self, visual: Visual) {
        self.visual = Some(visual);
    }

    /// Asset reference persisted in place of the visual
    pub fn asset_ref(&self) -> Option<&str> {
        self.asset.as_deref()
    }

    pub fn set_asset_ref(&mut self, asset: &str) {
        self.asset = Some(asset.to_string());
    }

    /// Whether the visual is still a stand-in for the referenced asset
    pub fn awaits_asset(&self) -> bool {
        let loaded = matches!(
            self.visual.as_ref().map(|v| &v.shape),
            Some(Shape::Asset { .. })
        );
        self.asset.is_some() && !loaded
    }

    pub fn position(&self) -> Option<Point3<f64>> {
        self.position
    }

    pub fn rotation(&self) -> Option<Vector3<f64>> {
        self.rotation
    }

    pub fn set_position(&mut self, position: Point3<f64>) {
        self.position = Some(position);
        if let Some(visual) = self.visual.as_mut() {
            visual.position = position;
        }
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f64>) {
        self.rotation = Some(rotation);
        if let Some(visual) = self.visual.as_mut() {
            visual.rotation = rotation;
        }
    }

    /// External entity this device is bound to
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn is_linked(&self) -> bool {
        self.entity_id.is_some()
    }

    /// Record the entity link and mark the device as linked
    pub fn link(&mut self, entity_id: &str) {
        self.entity_id = Some(entity_id.to_string());
        debug!(device = %self.id, entity = %entity_id, "Device linked");
        self.set_color(DeviceColor::Blue);
    }

    /// Record the entity link, leaving the color to the binding
    pub fn set_entity_id(&mut self, entity_id: &str) {
        self.entity_id = Some(entity_id.to_string());
    }

    /// Drop the entity link and any installed click handler
    pub fn unlink(&mut self) {
        self.entity_id = None;
        self.on_click = None;
        self.set_color(DeviceColor::Gray);
    }

    pub fn set_color(&mut self, color: DeviceColor) {
        match self.visual.as_mut() {
            Some(visual) => {
                visual.set_color(color.hex());
            }
            None => warn!(device = %self.id, "Device has no visual to color"),
        }
    }

    /// Current color of the first material in the visual
    pub fn color(&self) -> Option<u32> {
        self.visual
            .as_ref()
            .and_then(|v| v.first_material())
            .map(|m| m.color)
    }

    /// Kind-specific reaction to an external state update
    pub fn apply_state(&mut self, state: &str, _attributes: &Attributes) {
        match self.kind {
            DeviceKind::Light => {
                let on = matches!(state, "on" | "true");
                match self.visual.as_mut().and_then(|v| v.light_mut()) {
                    Some(light) => light.intensity = if on { 1.0 } else { 0.0 },
                    None => warn!(device = %self.id, "Light device has no light source"),
                }
            }
            DeviceKind::Switch | DeviceKind::Sensor | DeviceKind::Generic => {}
        }
    }

    pub fn set_on_click(&mut self, handler: ClickHandler) {
        self.on_click = Some(handler);
    }

    pub fn clear_on_click(&mut self) {
        self.on_click = None;
    }

    pub fn has_click_handler(&self) -> bool {
        self.on_click.is_some()
    }

    /// What a click on this device resolves to, and the handler that should run
    fn resolve_click(&self) -> (DeviceClick, Option<ClickHandler>) {
        let click = DeviceClick {
            device_id: self.id.clone(),
            entity_id: self.entity_id.clone(),
        };
        (click, self.on_click.clone())
    }

    /// Replace the placeholder visual with a freshly loaded one.
    ///
    /// The placeholder is detached from its render parent and the replacement
    /// takes its place. Material is inherited when the replacement has none,
    /// and the device's current position and rotation are re-applied.
    pub fn swap_visual(&mut self, mut replacement: Visual) {
        if let Shape::Asset { path } = &replacement.shape {
            self.asset = Some(path.clone());
        }
        let placeholder = self.visual.take();

        if let Some(mut placeholder) = placeholder {
            replacement.parent = placeholder.parent.take();
            replacement.set_shadows(placeholder.cast_shadow, placeholder.receive_shadow);
            if replacement.device_id.is_none() {
                replacement.device_id = placeholder.device_id.clone();
            }
            if !replacement.has_material() {
                replacement.material = placeholder.first_material();
            }
        }

        if let Some(position) = self.position {
            replacement.position = position;
        }
        if let Some(rotation) = self.rotation {
            replacement.rotation = rotation;
        }

        self.visual = Some(replacement);
    }
}

impl fmt::Debug for DeviceEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEntity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("visual", &self.visual)
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("asset", &self.asset)
            .field("entity_id", &self.entity_id)
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}
