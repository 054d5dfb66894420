//! Ray casting against scene objects

use nalgebra::{Point3, Rotation3, Unit, Vector3};

const PARALLEL_EPSILON: f64 = 1e-12;

/// A picking ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            origin,
            direction: Unit::new_normalize(direction),
        }
    }

    /// Point at distance `t` along the ray
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction.into_inner() * t
    }
}

/// Rotation for an XYZ-ordered Euler triple
pub fn euler_rotation(euler: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), euler.x)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), euler.y)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), euler.z)
}

/// A box with arbitrary orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Point3<f64>,
    pub half_extents: Vector3<f64>,
    pub rotation: Rotation3<f64>,
}

impl OrientedBox {
    pub fn new(center: Point3<f64>, half_extents: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self {
            center,
            half_extents,
            rotation,
        }
    }

    /// Distance along the ray to the first surface hit, if any.
    ///
    /// A ray starting inside the box reports the exit distance.
    pub fn intersect(&self, ray: &Ray) -> Option<f64> {
        let inverse = self.rotation.inverse();
        let origin = inverse * (ray.origin - self.center);
        let direction = inverse * ray.direction.into_inner();

        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;

        for axis in 0..3 {
            let (o, d, h) = (origin[axis], direction[axis], self.half_extents[axis]);
            if d.abs() < PARALLEL_EPSILON {
                if o.abs() > h {
                    return None;
                }
                continue;
            }
            let (t1, t2) = ((-h - o) / d, (h - o) / d);
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
        }

        if t_far < t_near.max(0.0) {
            return None;
        }
        Some(if t_near >= 0.0 { t_near } else { t_far })
    }
}

/// Distance to a horizontal plane at height `y`, if the ray reaches it
pub fn intersect_ground(ray: &Ray, y: f64) -> Option<f64> {
    let dy = ray.direction.y;
    if dy.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = (y - ray.origin.y) / dy;
    (t >= 0.0).then_some(t)
}
