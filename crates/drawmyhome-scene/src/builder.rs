//! Floorplan to 3D scene conversion
//!
//! Walls are extruded from the 2D segments, device visuals are collected and
//! tagged for picking, and the combined bounds give a framing hint for the
//! camera. The output is rebuilt on every switch to the 3D view.

use nalgebra::{Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use drawmyhome_core::{FloorplanModel, Segment, SharedDevice};

use crate::picking::{euler_rotation, OrientedBox};

/// Wall material color
pub const WALL_COLOR: u32 = 0xcccccc;

/// Fraction of the wall width added to every wall length so corners close
pub const WALL_PADDING_FACTOR: f64 = 0.8;

/// Wall extrusion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Editor pixels per scene unit
    pub scale: f64,
    /// Wall thickness in scene units
    pub width: f64,
    /// Wall height in scene units
    pub height: f64,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            scale: 50.0,
            width: 0.2,
            height: 2.0,
        }
    }
}

/// A wall box aligned with its source segment
#[derive(Debug, Clone, PartialEq)]
pub struct WallMesh {
    /// Extent along the segment direction, including corner padding
    pub length: f64,
    pub height: f64,
    pub width: f64,
    /// Centre of the box in scene units
    pub position: Point3<f64>,
    /// Rotation about the vertical axis
    pub rotation_y: f64,
    pub color: u32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl WallMesh {
    fn from_segment(segment: &Segment, config: &WallConfig) -> Self {
        let (x1, z1) = (segment.x1 / config.scale, segment.y1 / config.scale);
        let (x2, z2) = (segment.x2 / config.scale, segment.y2 / config.scale);

        let length = ((x2 - x1).powi(2) + (z2 - z1).powi(2)).sqrt() + config.width * WALL_PADDING_FACTOR;

        Self {
            length,
            height: config.height,
            width: config.width,
            position: Point3::new((x1 + x2) / 2.0, 0.0, (z1 + z2) / 2.0),
            rotation_y: (x2 - x1).atan2(z2 - z1),
            color: WALL_COLOR,
            cast_shadow: true,
            receive_shadow: true,
        }
    }

    /// Rotation of the wall as an Euler triple
    pub fn rotation(&self) -> Vector3<f64> {
        Vector3::new(0.0, self.rotation_y, 0.0)
    }

    /// Picking volume: width on local x, height on y, length on z
    pub fn bounds(&self) -> OrientedBox {
        OrientedBox::new(
            self.position,
            Vector3::new(self.width, self.height, self.length) / 2.0,
            Rotation3::from_axis_angle(&Vector3::y_axis(), self.rotation_y),
        )
    }
}

/// Picking volume of a device's current visual
pub fn device_bounds(device: &SharedDevice) -> Option<OrientedBox> {
    let device = device.lock();
    let visual = device.visual()?;
    Some(OrientedBox::new(
        visual.position,
        visual.half_extents(),
        euler_rotation(&visual.rotation),
    ))
}

/// Centre of the scene on the floor plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanPosition {
    pub x: f64,
    pub z: f64,
}

/// Scene graph produced from a floorplan
#[derive(Debug, Default)]
pub struct SceneData {
    pub walls: Vec<WallMesh>,
    /// Devices whose visuals make up the device group
    pub devices: Vec<SharedDevice>,
    /// Camera framing hint
    pub average_position: PlanPosition,
}

/// Running min/max over the floor plane
struct PlaneBounds {
    min_x: f64,
    min_z: f64,
    max_x: f64,
    max_z: f64,
}

impl PlaneBounds {
    fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_z: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, x: f64, z: f64) {
        self.min_x = self.min_x.min(x);
        self.min_z = self.min_z.min(z);
        self.max_x = self.max_x.max(x);
        self.max_z = self.max_z.max(z);
    }

    fn center(&self) -> PlanPosition {
        if self.min_x > self.max_x {
            return PlanPosition::default();
        }
        PlanPosition {
            x: (self.min_x + self.max_x) / 2.0,
            z: (self.min_z + self.max_z) / 2.0,
        }
    }
}

/// Build the scene for a floorplan.
///
/// Device visuals are prepared in place: tagged with the device id, given
/// shadows and moved to the device's stored position. Devices without a
/// visual are skipped.
pub fn build(model: &FloorplanModel, config: &WallConfig) -> SceneData {
    let mut bounds = PlaneBounds::empty();

    let walls: Vec<WallMesh> = model
        .segments()
        .iter()
        .map(|segment| {
            bounds.include(segment.x1 / config.scale, segment.y1 / config.scale);
            bounds.include(segment.x2 / config.scale, segment.y2 / config.scale);
            WallMesh::from_segment(segment, config)
        })
        .collect();

    let mut devices = Vec::with_capacity(model.devices().len());
    for shared in model.devices() {
        let mut device = shared.lock();
        let id = device.id().to_string();
        let position = device.position();

        let Some(visual) = device.visual_mut() else {
            warn!(device = %id, "Device has no visual, skipping");
            continue;
        };
        if let Some(position) = position {
            visual.position = position;
        }
        visual.set_shadows(true, true);
        visual.device_id = Some(id);

        if let Some(position) = position {
            bounds.include(position.x, position.z);
        }
        devices.push(shared.clone());
    }

    let average_position = bounds.center();
    debug!(
        walls = walls.len(),
        devices = devices.len(),
        x = average_position.x,
        z = average_position.z,
        "Built scene"
    );

    SceneData {
        walls,
        devices,
        average_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use drawmyhome_core::{shared, DeviceEntity, DeviceFactory, DeviceKind};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_single_wall_dimensions() {
        let mut model = FloorplanModel::new();
        model.add_segment(Segment::new(0.0, 0.0, 50.0, 0.0));
        let scene = build(&model, &WallConfig::default());

        assert_eq!(scene.walls.len(), 1);
        let wall = &scene.walls[0];
        assert_relative_eq!(wall.length, 1.0 + 0.2 * 0.8);
        assert_relative_eq!(wall.position.x, 0.5);
        assert_relative_eq!(wall.position.z, 0.0);
        assert_relative_eq!(wall.rotation_y, FRAC_PI_2);
        assert!(wall.cast_shadow && wall.receive_shadow);
    }

    #[test]
    fn test_wall_along_y_axis() {
        let mut model = FloorplanModel::new();
        model.add_segment(Segment::new(0.0, 0.0, 0.0, 100.0));
        let scene = build(&model, &WallConfig::default());
        let wall = &scene.walls[0];
        assert_relative_eq!(wall.rotation_y, 0.0);
        assert_relative_eq!(wall.position.z, 1.0);
        assert_relative_eq!(wall.length, 2.16);
    }

    #[test]
    fn test_average_position_includes_devices() {
        let mut model = FloorplanModel::new();
        model.add_segment(Segment::new(0.0, 0.0, 100.0, 0.0));

        let device = DeviceFactory::without_assets().create("light");
        device.lock().set_position(Point3::new(4.0, 1.0, 6.0));
        model.add_device(device.clone());

        let scene = build(&model, &WallConfig::default());
        assert_relative_eq!(scene.average_position.x, 2.0);
        assert_relative_eq!(scene.average_position.z, 3.0);

        let device = device.lock();
        let visual = device.visual().unwrap();
        assert_eq!(visual.device_id.as_deref(), Some(device.id()));
        assert_eq!(visual.position, Point3::new(4.0, 1.0, 6.0));
        assert!(visual.cast_shadow);
    }

    #[test]
    fn test_device_without_visual_skipped() {
        let mut model = FloorplanModel::new();
        model.add_device(shared(DeviceEntity::new("ghost_1", DeviceKind::Generic)));
        let scene = build(&model, &WallConfig::default());
        assert!(scene.devices.is_empty());
    }

    #[test]
    fn test_empty_model_frames_origin() {
        let scene = build(&FloorplanModel::new(), &WallConfig::default());
        assert_eq!(scene.average_position, PlanPosition::default());
        assert!(scene.walls.is_empty());
    }

    #[test]
    fn test_wall_bounds_follow_segment() {
        let wall = WallMesh::from_segment(&Segment::new(0.0, 0.0, 100.0, 0.0), &WallConfig::default());
        let bounds = wall.bounds();
        // Segment runs along x, so the long axis of the box is world x
        assert_relative_eq!((bounds.rotation * Vector3::z()).x, 1.0, epsilon = 1e-12);
    }
}
