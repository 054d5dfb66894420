//! Orthographic camera framing

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::builder::PlanPosition;
use crate::picking::Ray;

/// Offset of the camera from the framed plan centre
pub const CAMERA_OFFSET: f64 = 5.0;

/// Height of the orbit target above the floor
pub const TARGET_HEIGHT: f64 = 0.5;

/// Viewport pixels per scene unit across the full frustum width
pub const PIXELS_PER_UNIT: f64 = 10.0;

/// Orthographic camera state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Point3<f64>,
    pub target: Point3<f64>,
    /// Half the frustum width in scene units
    pub half_width: f64,
    /// Half the frustum height in scene units
    pub half_height: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::new(CAMERA_OFFSET, CAMERA_OFFSET, CAMERA_OFFSET),
            target: Point3::new(0.0, 2.0, 0.0),
            half_width: 200.0,
            half_height: 200.0,
            near: -1000.0,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Look at a plan centre from a fixed diagonal offset
    pub fn frame(&mut self, center: PlanPosition) {
        self.position = Point3::new(center.x + CAMERA_OFFSET, CAMERA_OFFSET, center.z + CAMERA_OFFSET);
        self.target = Point3::new(center.x, TARGET_HEIGHT, center.z);
    }

    /// Fit the frustum to a viewport in pixels
    pub fn resize(&mut self, width: f64, height: f64) {
        self.half_width = width / (2.0 * PIXELS_PER_UNIT);
        self.half_height = height / (2.0 * PIXELS_PER_UNIT);
    }

    pub fn forward(&self) -> Vector3<f64> {
        (self.target - self.position).normalize()
    }

    /// Picking ray for a pointer in normalized device coordinates
    pub fn ray(&self, ndc_x: f64, ndc_y: f64) -> Ray {
        let forward = self.forward();
        let right = forward.cross(&Vector3::y()).normalize();
        let up = right.cross(&forward);

        let on_plane = self.position
            + right * (ndc_x * self.half_width)
            + up * (ndc_y * self.half_height);
        Ray::new(on_plane + forward * self.near, forward)
    }
}

/// Convert a viewport pixel position to normalized device coordinates
pub fn to_ndc(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    ((x / width) * 2.0 - 1.0, -(y / height) * 2.0 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_around_plan_centre() {
        let mut camera = Camera::default();
        camera.frame(PlanPosition { x: 2.0, z: -1.0 });
        assert_eq!(camera.position, Point3::new(7.0, 5.0, 4.0));
        assert_eq!(camera.target, Point3::new(2.0, 0.5, -1.0));
    }

    #[test]
    fn test_resize_sets_frustum() {
        let mut camera = Camera::default();
        camera.resize(400.0, 300.0);
        assert_relative_eq!(camera.half_width, 20.0);
        assert_relative_eq!(camera.half_height, 15.0);
    }

    #[test]
    fn test_centre_ray_passes_through_target() {
        let mut camera = Camera::default();
        camera.frame(PlanPosition { x: 1.0, z: 1.0 });
        let ray = camera.ray(0.0, 0.0);
        let to_target = camera.target - ray.origin;
        let along = to_target.dot(&ray.direction.into_inner());
        assert_relative_eq!(ray.at(along), camera.target, epsilon = 1e-9);
    }

    #[test]
    fn test_ndc_conversion() {
        assert_eq!(to_ndc(0.0, 0.0, 200.0, 100.0), (-1.0, 1.0));
        assert_eq!(to_ndc(100.0, 50.0, 200.0, 100.0), (0.0, 0.0));
        assert_eq!(to_ndc(10.0, 10.0, 0.0, 0.0), (0.0, 0.0));
    }
}
