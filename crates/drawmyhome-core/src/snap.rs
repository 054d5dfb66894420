//! Snap strategies applied to pointer input before it reaches a drawing tool

use crate::geometry::{Point2, Segment};

/// Endpoint capture radius in editor pixels
pub const SNAP_TOLERANCE: f64 = 10.0;

/// Context for a single snap query, rebuilt on every pointer event
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapData<'a> {
    /// Segments currently in the plan
    pub segments: &'a [Segment],
    /// Anchor of the active tool, if a gesture is in progress
    pub last_point: Option<Point2>,
}

impl<'a> SnapData<'a> {
    pub fn new(segments: &'a [Segment], last_point: Option<Point2>) -> Self {
        Self {
            segments,
            last_point,
        }
    }
}

/// A point adjustment policy
pub trait SnapStrategy: Send + Sync {
    /// Resolve a candidate point against the snap context
    fn resolve(&self, candidate: Point2, data: &SnapData<'_>) -> Point2;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Constrains drawing to horizontal or vertical lines from the tool anchor
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisSnap;

impl SnapStrategy for AxisSnap {
    fn resolve(&self, candidate: Point2, data: &SnapData<'_>) -> Point2 {
        let Some(anchor) = data.last_point else {
            return candidate;
        };

        let dx = (candidate.x - anchor.x).abs();
        let dy = (candidate.y - anchor.y).abs();

        if dx > dy {
            Point2::new(candidate.x, anchor.y)
        } else {
            Point2::new(anchor.x, candidate.y)
        }
    }

    fn name(&self) -> &'static str {
        "axis"
    }
}

/// Captures the first segment endpoint within [`SNAP_TOLERANCE`], in insertion order
#[derive(Debug, Clone, Copy, Default)]
pub struct ProximitySnap;

impl SnapStrategy for ProximitySnap {
    fn resolve(&self, candidate: Point2, data: &SnapData<'_>) -> Point2 {
        data.segments
            .iter()
            .flat_map(|segment| segment.endpoints())
            .find(|endpoint| candidate.distance(*endpoint) < SNAP_TOLERANCE)
            .unwrap_or(candidate)
    }

    fn name(&self) -> &'static str {
        "proximity"
    }
}
