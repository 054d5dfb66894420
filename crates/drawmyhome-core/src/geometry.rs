//! 2D primitives for floorplan walls
//!
//! Coordinates are editor-local pixels as captured at authoring time. They are
//! only converted to scene units when the 3D scene is built.

use serde::{Deserialize, Serialize};

/// A point on the drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An immutable wall segment from (x1, y1) to (x2, y2)
///
/// Serializes as the plain `{x1, y1, x2, y2}` record used by saved plans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Segment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a segment between two points
    pub fn between(start: Point2, end: Point2) -> Self {
        Self::new(start.x, start.y, end.x, end.y)
    }

    pub fn start(&self) -> Point2 {
        Point2::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point2 {
        Point2::new(self.x2, self.y2)
    }

    /// Both endpoints, start first
    pub fn endpoints(&self) -> [Point2; 2] {
        [self.start(), self.end()]
    }

    pub fn length(&self) -> f64 {
        self.start().distance(self.end())
    }

    pub fn midpoint(&self) -> Point2 {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Perpendicular distance from `p` to the infinite line through this segment.
    ///
    /// Not clamped to the segment extent. Zero-length segments yield NaN.
    pub fn distance_to_line(&self, p: Point2) -> f64 {
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        (dy * p.x - dx * p.y + self.x2 * self.y1 - self.y2 * self.x1).abs()
            / (dy.powi(2) + dx.powi(2)).sqrt()
    }

    /// Whether `p` lies strictly inside the bounding box grown by `tolerance` on every side
    pub fn within_extended_bounds(&self, p: Point2, tolerance: f64) -> bool {
        p.x > self.x1.min(self.x2) - tolerance
            && p.x < self.x1.max(self.x2) + tolerance
            && p.y > self.y1.min(self.y2) - tolerance
            && p.y < self.y1.max(self.y2) + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_length_and_midpoint() {
        let seg = Segment::new(0.0, 0.0, 30.0, 40.0);
        assert_eq!(seg.length(), 50.0);
        assert_eq!(seg.midpoint(), Point2::new(15.0, 20.0));
    }

    #[test]
    fn test_distance_to_line_is_unclamped() {
        let seg = Segment::new(0.0, 0.0, 100.0, 0.0);
        assert_eq!(seg.distance_to_line(Point2::new(50.0, 1.0)), 1.0);
        // Beyond the segment extent the distance is still to the infinite line
        assert_eq!(seg.distance_to_line(Point2::new(500.0, 3.0)), 3.0);
    }

    #[test]
    fn test_extended_bounds_are_strict() {
        let seg = Segment::new(0.0, 0.0, 100.0, 0.0);
        assert!(seg.within_extended_bounds(Point2::new(109.0, 5.0), 10.0));
        assert!(!seg.within_extended_bounds(Point2::new(110.0, 5.0), 10.0));
        assert!(!seg.within_extended_bounds(Point2::new(50.0, -10.0), 10.0));
    }

    #[test]
    fn test_segment_equality_is_structural() {
        let a = Segment::between(Point2::new(1.0, 2.0), Point2::new(3.0, 4.0));
        assert_eq!(a, Segment::new(1.0, 2.0, 3.0, 4.0));
        assert_ne!(a, Segment::new(3.0, 4.0, 1.0, 2.0));
    }

    #[test]
    fn test_segment_record_shape() {
        let json = serde_json::to_value(Segment::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, serde_json::json!({"x1": 1.0, "y1": 2.0, "x2": 3.0, "y2": 4.0}));
    }
}
