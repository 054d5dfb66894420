//! Draw My Home Scene - 3D scene building and the live render session
//!
//! This crate turns a floorplan into a renderable scene and runs it:
//! - Wall extrusion and device collection from the floorplan model
//! - Orthographic camera framing
//! - Ray picking against walls, devices and the ground
//! - The scene session that owns the render loop and dispatches device clicks

pub mod builder;
pub mod camera;
pub mod picking;
pub mod session;

pub use builder::{build, PlanPosition, SceneData, WallConfig, WallMesh};
pub use camera::Camera;
pub use picking::{OrientedBox, Ray};
pub use session::{Frame, Hit, HitTarget, Renderer, SceneSession};
