//! 2D drawing surface contract and plan rendering

use crate::geometry::{Point2, Segment};

/// Grid pitch of the editor background, in pixels
pub const GRID_SPACING: f64 = 10.0;

pub const BACKGROUND_COLOR: &str = "#1d1e23";
pub const GRID_COLOR: &str = "#797a7e22";
pub const WALL_COLOR: &str = "#75bae9";
pub const ERASER_COLOR: &str = "red";

/// Line cap for strokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
}

/// Stroke parameters applied to subsequent drawing calls
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
    pub cap: LineCap,
}

impl StrokeStyle {
    pub fn new(color: &str, width: f64) -> Self {
        Self {
            color: color.to_string(),
            width,
            cap: LineCap::Butt,
        }
    }

    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::new(WALL_COLOR, 2.0)
    }
}

/// A 2D drawing surface provided by the host
pub trait Canvas2d {
    /// Clear and fill the whole surface
    fn fill_background(&mut self, color: &str, width: f64, height: f64);
    fn set_stroke(&mut self, style: StrokeStyle);
    fn line(&mut self, from: Point2, to: Point2);
    fn rect(&mut self, origin: Point2, width: f64, height: f64);
    fn circle(&mut self, center: Point2, radius: f64);
    /// A zero-length stroke, visible only with a round cap
    fn dot(&mut self, at: Point2);
}

/// Render the editor background grid and every wall segment
pub fn render_plan(canvas: &mut dyn Canvas2d, segments: &[Segment], width: f64, height: f64) {
    canvas.fill_background(BACKGROUND_COLOR, width, height);

    canvas.set_stroke(StrokeStyle::new(GRID_COLOR, 1.0));
    let mut x = 0.0;
    while x < width {
        canvas.line(Point2::new(x, 0.0), Point2::new(x, height));
        x += GRID_SPACING;
    }
    let mut y = 0.0;
    while y < height {
        canvas.line(Point2::new(0.0, y), Point2::new(width, y));
        y += GRID_SPACING;
    }

    canvas.set_stroke(StrokeStyle::new(WALL_COLOR, 2.0));
    for segment in segments {
        canvas.line(segment.start(), segment.end());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Drawing calls captured by [`RecordingCanvas`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum Op {
        Background(String),
        Stroke(StrokeStyle),
        Line(Point2, Point2),
        Rect(Point2, f64, f64),
        Circle(Point2, f64),
        Dot(Point2),
    }

    #[derive(Debug, Default)]
    pub struct RecordingCanvas {
        pub ops: Vec<Op>,
    }

    impl RecordingCanvas {
        pub fn lines(&self) -> usize {
            self.ops.iter().filter(|op| matches!(op, Op::Line(..))).count()
        }
    }

    impl Canvas2d for RecordingCanvas {
        fn fill_background(&mut self, color: &str, _width: f64, _height: f64) {
            self.ops.push(Op::Background(color.to_string()));
        }
        fn set_stroke(&mut self, style: StrokeStyle) {
            self.ops.push(Op::Stroke(style));
        }
        fn line(&mut self, from: Point2, to: Point2) {
            self.ops.push(Op::Line(from, to));
        }
        fn rect(&mut self, origin: Point2, width: f64, height: f64) {
            self.ops.push(Op::Rect(origin, width, height));
        }
        fn circle(&mut self, center: Point2, radius: f64) {
            self.ops.push(Op::Circle(center, radius));
        }
        fn dot(&mut self, at: Point2) {
            self.ops.push(Op::Dot(at));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Op, RecordingCanvas};
    use super::*;

    #[test]
    fn test_render_plan_draws_grid_then_walls() {
        let mut canvas = RecordingCanvas::default();
        let segments = [Segment::new(0.0, 0.0, 50.0, 0.0)];
        render_plan(&mut canvas, &segments, 30.0, 20.0);

        assert_eq!(canvas.ops[0], Op::Background(BACKGROUND_COLOR.to_string()));
        // 3 vertical + 2 horizontal grid lines + 1 wall
        assert_eq!(canvas.lines(), 6);
        assert_eq!(
            canvas.ops.last(),
            Some(&Op::Line(Point2::new(0.0, 0.0), Point2::new(50.0, 0.0)))
        );
        assert!(canvas.ops.contains(&Op::Stroke(StrokeStyle::new(WALL_COLOR, 2.0))));
    }
}
