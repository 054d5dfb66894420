//! Floorplan aggregate and its persisted record shape

use std::collections::HashSet;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::device::{shared, DeviceEntity, DeviceKind, SharedDevice};
use crate::factory::placeholder;
use crate::geometry::Segment;
use crate::visual::{Shape, Visual};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid plan record: {0}")]
    InvalidRecord(String),
}

/// A 3-component vector as stored in plan records
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl From<Point3<f64>> for PositionRecord {
    fn from(p: Point3<f64>) -> Self {
        Self { x: p.x, y: p.y, z: p.z }
    }
}

impl From<Vector3<f64>> for PositionRecord {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl PositionRecord {
    pub fn point(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Persisted form of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DeviceKind>,
    #[serde(default)]
    pub position: PositionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<PositionRecord>,
    /// Snapshot of a self-contained visual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Visual>,
    /// Reference to an external asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Persisted form of a whole plan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanRecord {
    #[serde(default)]
    pub paths: Vec<Segment>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// Walls and placed devices of one floorplan
///
/// Segments and devices are independent collections: removing one never
/// touches the other.
#[derive(Debug, Default)]
pub struct FloorplanModel {
    segments: Vec<Segment>,
    devices: Vec<SharedDevice>,
}

impl FloorplanModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Mutable access for tools that edit walls in place
    pub fn segments_mut(&mut self) -> &mut Vec<Segment> {
        &mut self.segments
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn add_segments(&mut self, segments: impl IntoIterator<Item = Segment>) {
        self.segments.extend(segments);
    }

    pub fn devices(&self) -> &[SharedDevice] {
        &self.devices
    }

    pub fn add_device(&mut self, device: SharedDevice) {
        self.devices.push(device);
    }

    pub fn find_device(&self, id: &str) -> Option<SharedDevice> {
        self.devices.iter().find(|d| d.lock().id() == id).cloned()
    }

    /// Remove a device and detach its visual from the scene
    pub fn remove_device(&mut self, id: &str) -> Option<SharedDevice> {
        let index = self.devices.iter().position(|d| d.lock().id() == id)?;
        let device = self.devices.remove(index);
        if let Some(visual) = device.lock().visual_mut() {
            visual.parent = None;
        }
        Some(device)
    }

    /// A plan with no walls
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.devices.clear();
    }

    pub fn to_record(&self) -> PlanRecord {
        PlanRecord {
            paths: self.segments.clone(),
            devices: self.devices.iter().map(|d| device_record(&d.lock())).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Rebuild a model, re-deriving every device visual from its record
    pub fn from_record(record: PlanRecord) -> Result<Self, PlanError> {
        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(record.devices.len());
        for device in record.devices {
            if device.id.is_empty() {
                return Err(PlanError::InvalidRecord("device without id".to_string()));
            }
            if !seen.insert(device.id.clone()) {
                return Err(PlanError::InvalidRecord(format!(
                    "duplicate device id {}",
                    device.id
                )));
            }
            devices.push(rehydrate(device));
        }

        debug!(
            segments = record.paths.len(),
            devices = devices.len(),
            "Rebuilt floorplan from record"
        );
        Ok(Self {
            segments: record.paths,
            devices,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Self::from_record(serde_json::from_str(json)?)
    }
}

fn device_record(device: &DeviceEntity) -> DeviceRecord {
    let (mesh, mesh_ref) = match (device.visual(), device.asset_ref()) {
        (
            Some(Visual {
                shape: Shape::Asset { path },
                ..
            }),
            _,
        ) => (None, Some(path.clone())),
        // Placeholder standing in for an asset that has not loaded yet
        (_, Some(asset)) => (None, Some(asset.to_string())),
        (Some(visual), None) => (Some(visual.clone()), None),
        (None, None) => (None, None),
    };

    DeviceRecord {
        id: device.id().to_string(),
        kind: Some(device.kind()),
        position: device.position().map(Into::into).unwrap_or_default(),
        rotation: device.rotation().map(Into::into),
        mesh,
        mesh_ref,
        entity_id: device.entity_id().map(str::to_string),
    }
}

fn rehydrate(record: DeviceRecord) -> SharedDevice {
    let kind = record
        .kind
        .unwrap_or_else(|| DeviceKind::from_device_id(&record.id));

    let visual = match &record.mesh {
        Some(snapshot) => Visual::from_snapshot(snapshot),
        None => {
            if record.mesh_ref.is_none() {
                warn!(device = %record.id, "Device record has no visual, using placeholder");
            }
            placeholder(kind)
        }
    };

    let mut device = DeviceEntity::new(record.id, kind);
    device.set_visual(visual);
    // The asset itself is loaded by the device factory
    if let Some(asset) = &record.mesh_ref {
        device.set_asset_ref(asset);
    }
    device.set_position(record.position.point());
    if let Some(rotation) = record.rotation {
        device.set_rotation(rotation.vector());
    }
    // Subscriptions are restored by the binding layer
    if let Some(entity_id) = record.entity_id {
        device.link(&entity_id);
    }
    shared(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::DeviceFactory;
    use crate::visual::SceneGroup;
    use serde_json::json;

    fn sample_model() -> FloorplanModel {
        let factory = DeviceFactory::without_assets();
        let mut model = FloorplanModel::new();
        model.add_segments([
            Segment::new(0.0, 0.0, 100.0, 0.0),
            Segment::new(100.0, 0.0, 100.0, 80.0),
        ]);

        let light = factory.create("light");
        light.lock().set_position(Point3::new(1.0, 0.5, 2.0));
        light.lock().link("light.kitchen");
        model.add_device(light);

        let sensor = factory.create("sensor");
        sensor.lock().set_position(Point3::new(-1.0, 0.0, 0.5));
        sensor.lock().set_rotation(Vector3::new(0.0, 1.0, 0.0));
        model.add_device(sensor);
        model
    }

    #[test]
    fn test_round_trip() {
        let model = sample_model();
        let json = model.to_json().unwrap();
        let restored = FloorplanModel::from_json(&json).unwrap();

        assert_eq!(restored.segments(), model.segments());
        assert_eq!(restored.devices().len(), 2);
        for (a, b) in model.devices().iter().zip(restored.devices()) {
            let (a, b) = (a.lock(), b.lock());
            assert_eq!(a.id(), b.id());
            assert_eq!(a.position(), b.position());
            assert_eq!(a.rotation(), b.rotation());
            assert_eq!(a.entity_id(), b.entity_id());
            assert!(b.visual().is_some());
        }
    }

    #[test]
    fn test_snapshot_rebuilt_detached() {
        let model = sample_model();
        model.devices()[0].lock().visual_mut().unwrap().parent = Some(SceneGroup::Devices);
        let restored = FloorplanModel::from_record(model.to_record()).unwrap();
        let device = restored.devices()[0].lock();
        assert_eq!(device.visual().unwrap().parent, None);
        assert_eq!(device.visual().unwrap().position, Point3::new(1.0, 0.5, 2.0));
    }

    #[test]
    fn test_record_wire_shape() {
        let record = sample_model().to_record();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["paths"][0], json!({"x1": 0.0, "y1": 0.0, "x2": 100.0, "y2": 0.0}));
        assert_eq!(value["devices"][0]["entityId"], json!("light.kitchen"));
        assert_eq!(value["devices"][0]["position"], json!({"x": 1.0, "y": 0.5, "z": 2.0}));
        assert!(value["devices"][1].get("entityId").is_none());
    }

    #[test]
    fn test_minimal_record_uses_placeholder() {
        let json = r#"{"paths": [], "devices": [{"id": "sensor_abc", "meshRef": "sensor.glb"}]}"#;
        let model = FloorplanModel::from_json(json).unwrap();
        let device = model.devices()[0].lock();
        assert_eq!(device.kind(), DeviceKind::Sensor);
        assert_eq!(device.visual().unwrap().shape, Shape::Cylinder { radius: 0.2, height: 0.1 });
        assert_eq!(device.position(), Some(Point3::origin()));
    }

    #[test]
    fn test_asset_visual_saved_as_reference() {
        let mut device = DeviceEntity::new("switch_1", DeviceKind::Switch);
        device.set_visual(Visual::asset("./www/models3d/switch.glb"));
        let record = device_record(&device);
        assert!(record.mesh.is_none());
        assert_eq!(record.mesh_ref.as_deref(), Some("./www/models3d/switch.glb"));
    }

    #[test]
    fn test_asset_reference_survives_reload() {
        let mut model = FloorplanModel::new();
        let mut device = DeviceEntity::new("switch_1", DeviceKind::Switch);
        device.set_visual(Visual::asset("./www/models3d/switch.glb"));
        device.set_position(Point3::new(1.0, 0.0, 1.0));
        model.add_device(shared(device));

        let first = model.to_record();
        let restored = FloorplanModel::from_record(first.clone()).unwrap();
        {
            let device = restored.devices()[0].lock();
            assert_eq!(device.visual().unwrap().shape, Shape::Box { size: [0.5; 3] });
            assert!(device.awaits_asset());
        }

        let second = restored.to_record();
        assert_eq!(second.devices[0].mesh_ref.as_deref(), Some("./www/models3d/switch.glb"));
        assert!(second.devices[0].mesh.is_none());
        assert_eq!(second, first);
    }

    #[test]
    fn test_empty_document_is_empty_plan() {
        let model = FloorplanModel::from_json("{}").unwrap();
        assert!(model.is_empty());
        assert!(model.devices().is_empty());
    }

    #[test]
    fn test_invalid_records_rejected() {
        let dup = r#"{"devices": [{"id": "a_1"}, {"id": "a_1"}]}"#;
        assert!(matches!(
            FloorplanModel::from_json(dup),
            Err(PlanError::InvalidRecord(_))
        ));
        assert!(matches!(
            FloorplanModel::from_json("not json"),
            Err(PlanError::Json(_))
        ));
    }

    #[test]
    fn test_segments_and_devices_independent() {
        let mut model = sample_model();
        model.segments_mut().clear();
        assert_eq!(model.devices().len(), 2);

        let id = model.devices()[0].lock().id().to_string();
        assert!(model.remove_device(&id).is_some());
        assert!(model.find_device(&id).is_none());
        assert_eq!(model.devices().len(), 1);
    }
}
