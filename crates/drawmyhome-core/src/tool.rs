//! Drawing tools that turn pointer gestures into wall segments
//!
//! Every tool follows the same press → hover* → release protocol:
//! - idle: no anchor captured
//! - pressed: anchor captured, hover updates the preview point
//! - release emits the finished segments and returns the tool to idle
//!
//! The eraser is the exception: it removes segments while hovering and never
//! emits anything on release.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::canvas::{Canvas2d, LineCap, StrokeStyle, ERASER_COLOR};
use crate::geometry::{Point2, Segment};

/// Number of sides used to approximate a circle
pub const CIRCLE_SIDES: usize = 24;

/// Pointer radius of the eraser in editor pixels
pub const ERASER_TOLERANCE: f64 = 10.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{tool} tool released without a preceding press")]
    ReleaseWithoutPress { tool: ToolKind },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// The tools offered by the palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Line,
    Rectangle,
    Circle,
    Eraser,
}

impl ToolKind {
    /// Create a fresh tool in the idle state
    pub fn create(self) -> Box<dyn DrawingTool> {
        match self {
            Self::Line => Box::new(LineTool::default()),
            Self::Rectangle => Box::new(RectangleTool::default()),
            Self::Circle => Box::new(CircleTool::default()),
            Self::Eraser => Box::new(EraserTool::default()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Eraser => "eraser",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" => Ok(Self::Line),
            "rectangle" => Ok(Self::Rectangle),
            "circle" => Ok(Self::Circle),
            "eraser" => Ok(Self::Eraser),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

/// Capabilities shared by every drawing tool
pub trait DrawingTool: Send {
    fn kind(&self) -> ToolKind;

    /// Capture the gesture anchor
    fn press(&mut self, at: Point2);

    /// Track the pointer. Only the eraser mutates `segments`.
    fn hover(&mut self, at: Point2, segments: &mut Vec<Segment>);

    /// Finish the gesture, returning the segments to append to the plan
    fn release(&mut self, at: Point2) -> Result<Option<Vec<Segment>>, ToolError>;

    /// Render the in-progress preview
    fn draw(&self, canvas: &mut dyn Canvas2d);

    /// The anchor captured by the last press, if the gesture is still active
    fn first_point(&self) -> Option<Point2>;
}

/// Anchor and preview point of an in-progress gesture
#[derive(Debug, Clone, Copy, Default)]
struct Gesture {
    first: Option<Point2>,
    last: Option<Point2>,
}

impl Gesture {
    fn press(&mut self, at: Point2) {
        self.first = Some(at);
        self.last = None;
    }

    /// Take the anchor and reset to idle
    fn finish(&mut self, tool: ToolKind) -> Result<Point2, ToolError> {
        let first = self.first.take().ok_or(ToolError::ReleaseWithoutPress { tool })?;
        self.last = None;
        Ok(first)
    }

    fn preview(&self) -> Option<(Point2, Point2)> {
        Some((self.first?, self.last?))
    }
}

#[derive(Debug, Default)]
pub struct LineTool {
    gesture: Gesture,
}

impl DrawingTool for LineTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Line
    }

    fn press(&mut self, at: Point2) {
        self.gesture.press(at);
    }

    fn hover(&mut self, at: Point2, _segments: &mut Vec<Segment>) {
        self.gesture.last = Some(at);
    }

    fn release(&mut self, at: Point2) -> Result<Option<Vec<Segment>>, ToolError> {
        let first = self.gesture.finish(self.kind())?;
        Ok(Some(vec![Segment::between(first, at)]))
    }

    fn draw(&self, canvas: &mut dyn Canvas2d) {
        if let Some((first, last)) = self.gesture.preview() {
            canvas.set_stroke(StrokeStyle::default());
            canvas.line(first, last);
        }
    }

    fn first_point(&self) -> Option<Point2> {
        self.gesture.first
    }
}

#[derive(Debug, Default)]
pub struct RectangleTool {
    gesture: Gesture,
}

impl DrawingTool for RectangleTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Rectangle
    }

    fn press(&mut self, at: Point2) {
        self.gesture.press(at);
    }

    fn hover(&mut self, at: Point2, _segments: &mut Vec<Segment>) {
        self.gesture.last = Some(at);
    }

    fn release(&mut self, at: Point2) -> Result<Option<Vec<Segment>>, ToolError> {
        let first = self.gesture.finish(self.kind())?;
        Ok(Some(vec![
            Segment::new(first.x, first.y, at.x, first.y),
            Segment::new(at.x, first.y, at.x, at.y),
            Segment::new(at.x, at.y, first.x, at.y),
            Segment::new(first.x, at.y, first.x, first.y),
        ]))
    }

    fn draw(&self, canvas: &mut dyn Canvas2d) {
        if let Some((first, last)) = self.gesture.preview() {
            canvas.set_stroke(StrokeStyle::default());
            canvas.rect(first, last.x - first.x, last.y - first.y);
        }
    }

    fn first_point(&self) -> Option<Point2> {
        self.gesture.first
    }
}

#[derive(Debug, Default)]
pub struct CircleTool {
    gesture: Gesture,
}

impl CircleTool {
    /// Regular polygon around `center`, starting at angle 0 and closing on itself
    fn polygon(center: Point2, radius: f64) -> Vec<Segment> {
        let vertex = |i: usize| {
            let angle = (i as f64 / CIRCLE_SIDES as f64) * TAU;
            Point2::new(center.x + angle.cos() * radius, center.y + angle.sin() * radius)
        };

        (0..CIRCLE_SIDES)
            .map(|i| Segment::between(vertex(i), vertex(i + 1)))
            .collect()
    }
}

impl DrawingTool for CircleTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Circle
    }

    fn press(&mut self, at: Point2) {
        self.gesture.press(at);
    }

    fn hover(&mut self, at: Point2, _segments: &mut Vec<Segment>) {
        self.gesture.last = Some(at);
    }

    fn release(&mut self, at: Point2) -> Result<Option<Vec<Segment>>, ToolError> {
        let center = self.gesture.finish(self.kind())?;
        let radius = center.distance(at);
        Ok(Some(Self::polygon(center, radius)))
    }

    fn draw(&self, canvas: &mut dyn Canvas2d) {
        if let Some((center, last)) = self.gesture.preview() {
            canvas.set_stroke(StrokeStyle::default());
            canvas.circle(center, center.distance(last));
        }
    }

    fn first_point(&self) -> Option<Point2> {
        self.gesture.first
    }
}

/// Removes wall segments under the pointer while hovering
#[derive(Debug, Default)]
pub struct EraserTool {
    gesture: Gesture,
}

impl EraserTool {
    fn touches(segment: &Segment, at: Point2) -> bool {
        segment.distance_to_line(at) < ERASER_TOLERANCE
            && segment.within_extended_bounds(at, ERASER_TOLERANCE)
    }
}

impl DrawingTool for EraserTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Eraser
    }

    fn press(&mut self, at: Point2) {
        self.gesture.press(at);
    }

    fn hover(&mut self, at: Point2, segments: &mut Vec<Segment>) {
        self.gesture.last = Some(at);

        let before = segments.len();
        segments.retain(|segment| !Self::touches(segment, at));
        let removed = before - segments.len();
        if removed > 0 {
            debug!(removed, x = at.x, y = at.y, "Erased segments");
        }
    }

    fn release(&mut self, _at: Point2) -> Result<Option<Vec<Segment>>, ToolError> {
        self.gesture = Gesture::default();
        Ok(None)
    }

    fn draw(&self, canvas: &mut dyn Canvas2d) {
        if let Some((_, last)) = self.gesture.preview() {
            canvas.set_stroke(StrokeStyle::new(ERASER_COLOR, ERASER_TOLERANCE).with_cap(LineCap::Round));
            canvas.dot(last);
        }
    }

    fn first_point(&self) -> Option<Point2> {
        self.gesture.first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::testing::{Op, RecordingCanvas};
    use approx::assert_relative_eq;

    fn closes_loop(segments: &[Segment]) -> bool {
        segments
            .iter()
            .zip(segments.iter().cycle().skip(1))
            .all(|(a, b)| a.end() == b.start())
    }

    #[test]
    fn test_line_emits_one_segment() {
        let mut tool = LineTool::default();
        tool.press(Point2::new(1.0, 2.0));
        let segments = tool.release(Point2::new(30.0, 40.0)).unwrap().unwrap();
        assert_eq!(segments, vec![Segment::new(1.0, 2.0, 30.0, 40.0)]);
        assert_eq!(tool.first_point(), None);
    }

    #[test]
    fn test_rectangle_emits_closed_loop() {
        let mut tool = RectangleTool::default();
        tool.press(Point2::new(0.0, 0.0));
        let segments = tool.release(Point2::new(100.0, 50.0)).unwrap().unwrap();
        assert_eq!(segments.len(), 4);
        assert!(closes_loop(&segments));
        assert_eq!(segments[0], Segment::new(0.0, 0.0, 100.0, 0.0));
        assert_eq!(segments[2], Segment::new(100.0, 50.0, 0.0, 50.0));
    }

    #[test]
    fn test_circle_emits_24_sided_polygon() {
        let mut tool = CircleTool::default();
        tool.press(Point2::new(10.0, 10.0));
        let segments = tool.release(Point2::new(13.0, 14.0)).unwrap().unwrap();
        assert_eq!(segments.len(), CIRCLE_SIDES);

        let center = Point2::new(10.0, 10.0);
        for (i, segment) in segments.iter().enumerate() {
            assert_relative_eq!(center.distance(segment.start()), 5.0, epsilon = 1e-9);
            assert_relative_eq!(center.distance(segment.end()), 5.0, epsilon = 1e-9);
            let next = &segments[(i + 1) % segments.len()];
            assert_relative_eq!(segment.end().x, next.start().x, epsilon = 1e-9);
            assert_relative_eq!(segment.end().y, next.start().y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_release_without_press_is_an_error() {
        for kind in [ToolKind::Line, ToolKind::Rectangle, ToolKind::Circle] {
            let mut tool = kind.create();
            let err = tool.release(Point2::new(1.0, 1.0)).unwrap_err();
            assert_eq!(err, ToolError::ReleaseWithoutPress { tool: kind });
        }
    }

    #[test]
    fn test_release_returns_tool_to_idle() {
        let mut tool = LineTool::default();
        tool.press(Point2::new(0.0, 0.0));
        tool.release(Point2::new(5.0, 0.0)).unwrap();
        assert!(tool.release(Point2::new(5.0, 0.0)).is_err());
    }

    #[test]
    fn test_eraser_removes_touching_segment() {
        let mut segments = vec![Segment::new(0.0, 0.0, 100.0, 0.0)];
        let mut eraser = EraserTool::default();
        eraser.press(Point2::new(50.0, 1.0));
        eraser.hover(Point2::new(50.0, 1.0), &mut segments);
        assert!(segments.is_empty());
        assert_eq!(eraser.release(Point2::new(50.0, 1.0)).unwrap(), None);
    }

    #[test]
    fn test_eraser_ignores_points_outside_extended_bounds() {
        let mut segments = vec![Segment::new(0.0, 0.0, 100.0, 0.0)];
        let mut eraser = EraserTool::default();
        eraser.press(Point2::new(200.0, 1.0));
        eraser.hover(Point2::new(200.0, 1.0), &mut segments);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_eraser_matches_just_past_segment_end() {
        // Beyond the endpoint but within the tolerance-grown box still matches
        let mut segments = vec![Segment::new(0.0, 0.0, 100.0, 0.0)];
        let mut eraser = EraserTool::default();
        eraser.hover(Point2::new(108.0, 2.0), &mut segments);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_eraser_keeps_order_of_survivors() {
        let mut segments = vec![
            Segment::new(0.0, 100.0, 100.0, 100.0),
            Segment::new(0.0, 0.0, 100.0, 0.0),
            Segment::new(0.0, 200.0, 100.0, 200.0),
        ];
        let mut eraser = EraserTool::default();
        eraser.hover(Point2::new(50.0, 3.0), &mut segments);
        assert_eq!(
            segments,
            vec![
                Segment::new(0.0, 100.0, 100.0, 100.0),
                Segment::new(0.0, 200.0, 100.0, 200.0),
            ]
        );
    }

    #[test]
    fn test_eraser_release_always_none() {
        let mut eraser = EraserTool::default();
        assert_eq!(eraser.release(Point2::new(0.0, 0.0)).unwrap(), None);
    }

    #[test]
    fn test_preview_only_while_pressed() {
        let mut canvas = RecordingCanvas::default();
        let mut tool = CircleTool::default();
        tool.draw(&mut canvas);
        assert!(canvas.ops.is_empty());

        tool.press(Point2::new(0.0, 0.0));
        tool.hover(Point2::new(3.0, 4.0), &mut Vec::new());
        tool.draw(&mut canvas);
        assert_eq!(canvas.ops.last(), Some(&Op::Circle(Point2::new(0.0, 0.0), 5.0)));
    }

    #[test]
    fn test_tool_kind_parse() {
        assert_eq!("rectangle".parse::<ToolKind>().unwrap(), ToolKind::Rectangle);
        assert!("lasso".parse::<ToolKind>().is_err());
        assert_eq!(ToolKind::Eraser.create().kind(), ToolKind::Eraser);
    }
}
