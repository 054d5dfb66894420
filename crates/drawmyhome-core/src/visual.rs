//! Renderable device representations
//!
//! A [`Visual`] is a lightweight description of a 3D object. Mesh, material and
//! light construction are left to the host renderer; this type only carries
//! what the editor needs to place, color, tag and pick device markers.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Half-extent assumed for asset-backed visuals whose geometry is unknown
pub const ASSET_HALF_EXTENT: f64 = 0.25;

/// Geometry of a visual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Box { size: [f64; 3] },
    Sphere { radius: f64 },
    Cylinder { radius: f64, height: f64 },
    /// Geometry loaded from an external model file
    Asset { path: String },
    /// A pure transform node with no geometry of its own
    Group,
}

/// Surface material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    /// Diffuse color as 0xRRGGBB
    pub color: u32,
}

impl Material {
    pub fn new(color: u32) -> Self {
        Self { color }
    }
}

/// A point light attached to a visual
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub color: u32,
    pub intensity: f64,
    pub distance: f64,
}

/// Scene graph group a visual is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneGroup {
    Walls,
    Devices,
}

/// A renderable object with an optional child hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    pub shape: Shape,
    #[serde(default)]
    pub material: Option<Material>,
    #[serde(default = "origin")]
    pub position: Point3<f64>,
    /// Euler rotation in radians
    #[serde(default = "no_rotation")]
    pub rotation: Vector3<f64>,
    #[serde(default)]
    pub light: Option<PointLight>,
    #[serde(default)]
    pub children: Vec<Visual>,
    #[serde(default)]
    pub cast_shadow: bool,
    #[serde(default)]
    pub receive_shadow: bool,
    /// Device this visual represents, set when it is added to a scene
    #[serde(default)]
    pub device_id: Option<String>,
    /// Render parent. Never persisted.
    #[serde(skip)]
    pub parent: Option<SceneGroup>,
}

fn origin() -> Point3<f64> {
    Point3::origin()
}

fn no_rotation() -> Vector3<f64> {
    Vector3::zeros()
}

impl Visual {
    pub fn new(shape: Shape, material: Option<Material>) -> Self {
        Self {
            shape,
            material,
            position: Point3::origin(),
            rotation: Vector3::zeros(),
            light: None,
            children: Vec::new(),
            cast_shadow: false,
            receive_shadow: false,
            device_id: None,
            parent: None,
        }
    }

    pub fn cube(size: f64, color: u32) -> Self {
        Self::new(Shape::Box { size: [size; 3] }, Some(Material::new(color)))
    }

    pub fn sphere(radius: f64, color: u32) -> Self {
        Self::new(Shape::Sphere { radius }, Some(Material::new(color)))
    }

    pub fn cylinder(radius: f64, height: f64, color: u32) -> Self {
        Self::new(Shape::Cylinder { radius, height }, Some(Material::new(color)))
    }

    /// An asset-backed visual without a material of its own
    pub fn asset(path: &str) -> Self {
        Self::new(Shape::Asset { path: path.to_string() }, None)
    }

    pub fn with_light(mut self, light: PointLight) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_child(mut self, child: Visual) -> Self {
        self.children.push(child);
        self
    }

    /// Set shadow flags on this visual and every descendant
    pub fn set_shadows(&mut self, cast: bool, receive: bool) {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        for child in &mut self.children {
            child.set_shadows(cast, receive);
        }
    }

    /// Apply `color` to every material in the hierarchy. Returns the number of materials touched.
    pub fn set_color(&mut self, color: u32) -> usize {
        let mut touched = 0;
        if let Some(material) = self.material.as_mut() {
            material.color = color;
            touched += 1;
        }
        for child in &mut self.children {
            touched += child.set_color(color);
        }
        touched
    }

    /// First material found depth-first
    pub fn first_material(&self) -> Option<Material> {
        self.material
            .or_else(|| self.children.iter().find_map(|c| c.first_material()))
    }

    /// Whether any node in the hierarchy carries a material
    pub fn has_material(&self) -> bool {
        self.first_material().is_some()
    }

    /// First light found depth-first
    pub fn light_mut(&mut self) -> Option<&mut PointLight> {
        if self.light.is_some() {
            return self.light.as_mut();
        }
        self.children.iter_mut().find_map(|c| c.light_mut())
    }

    pub fn light(&self) -> Option<&PointLight> {
        self.light
            .as_ref()
            .or_else(|| self.children.iter().find_map(|c| c.light()))
    }

    /// Local axis-aligned half extents, unioned over children offsets
    pub fn half_extents(&self) -> Vector3<f64> {
        let own = match &self.shape {
            Shape::Box { size } => Vector3::new(size[0], size[1], size[2]) / 2.0,
            Shape::Sphere { radius } => Vector3::repeat(*radius),
            Shape::Cylinder { radius, height } => Vector3::new(*radius, height / 2.0, *radius),
            Shape::Asset { .. } => Vector3::repeat(ASSET_HALF_EXTENT),
            Shape::Group => Vector3::zeros(),
        };

        self.children.iter().fold(own, |acc, child| {
            let reach = child.position.coords.abs() + child.half_extents();
            acc.sup(&reach)
        })
    }

    /// Rebuild a renderable visual from a persisted snapshot.
    ///
    /// Render attachment is runtime state, so the result is always detached.
    pub fn from_snapshot(snapshot: &Visual) -> Visual {
        let mut visual = snapshot.clone();
        visual.detach_all();
        visual
    }

    fn detach_all(&mut self) {
        self.parent = None;
        for child in &mut self.children {
            child.detach_all();
        }
    }
}
