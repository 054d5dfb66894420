//! Draw My Home Core - Floorplan primitives, drawing tools and device entities
//!
//! This crate provides the foundational pieces of the floorplan editor:
//! - Wall segments and the snap strategies applied to pointer input
//! - Drawing tools that turn press/hover/release gestures into segments
//! - Device entities, their visuals and the factory that builds them
//! - The floorplan model and its persisted record shape

pub mod canvas;
pub mod device;
pub mod factory;
pub mod geometry;
pub mod model;
pub mod snap;
pub mod surface;
pub mod tool;
pub mod visual;

pub use canvas::{render_plan, Canvas2d, LineCap, StrokeStyle};
pub use device::{
    dispatch_click, route_click, shared, Attributes, ClickHandler, DeviceClick, DeviceColor, DeviceEntity,
    DeviceKind, SharedDevice,
};
pub use factory::{placeholder, AssetError, AssetLoader, DeviceFactory, ModelDirLoader};
pub use geometry::{Point2, Segment};
pub use model::{DeviceRecord, FloorplanModel, PlanError, PlanRecord, PositionRecord};
pub use snap::{AxisSnap, ProximitySnap, SnapData, SnapStrategy, SNAP_TOLERANCE};
pub use surface::{SurfaceEvent, SurfaceEvents};
pub use tool::{DrawingTool, ToolError, ToolKind};
pub use visual::{Material, PointLight, SceneGroup, Shape, Visual};
