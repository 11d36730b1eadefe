//! Geometric primitives used by the curve pipeline.
//!
//! [`Point`], [`Segment`], and [`PlotGeometry`] live in world space. Screen-space
//! types are used by the transform and by render helpers.

/// A point in world space.
///
/// A point with a non-finite coordinate marks a pen-lift in a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X value in world coordinates.
    pub x: f64,
    /// Y value in world coordinates.
    pub y: f64,
}

impl Point {
    /// Create a new world point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a discontinuity marker located at `x`.
    pub fn discontinuity(x: f64) -> Self {
        Self { x, y: f64::NAN }
    }

    /// Check whether both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Check whether the point is a pen-lift marker.
    pub fn is_discontinuity(&self) -> bool {
        !self.is_finite()
    }

    /// Midpoint between two points.
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A line segment in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// First endpoint.
    pub a: Point,
    /// Second endpoint.
    pub b: Point,
}

impl Segment {
    /// Create a new segment.
    pub fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Segment midpoint.
    pub fn midpoint(&self) -> Point {
        self.a.midpoint(self.b)
    }
}

/// Finished curve geometry for one request and one viewport.
///
/// Geometry is an immutable snapshot. A newer publish supersedes it; the two
/// are never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotGeometry {
    polyline: Vec<Point>,
    segments: Vec<Segment>,
}

impl PlotGeometry {
    /// Create geometry from an explicit-function polyline.
    pub fn from_polyline(polyline: Vec<Point>) -> Self {
        Self {
            polyline,
            segments: Vec::new(),
        }
    }

    /// Create geometry from implicit-curve segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            polyline: Vec::new(),
            segments,
        }
    }

    /// Ordered polyline vertices, including discontinuity markers.
    pub fn polyline(&self) -> &[Point] {
        &self.polyline
    }

    /// Unordered line segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Check whether there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.polyline.is_empty() && self.segments.is_empty()
    }

    /// Iterate over the continuous runs of the polyline.
    ///
    /// Runs are separated by discontinuity markers and never contain one.
    pub fn runs(&self) -> impl Iterator<Item = &[Point]> {
        self.polyline
            .split(|point| point.is_discontinuity())
            .filter(|run| !run.is_empty())
    }

    /// Number of discontinuity markers in the polyline.
    pub fn discontinuities(&self) -> usize {
        self.polyline
            .iter()
            .filter(|point| point.is_discontinuity())
            .count()
    }
}

/// A point in screen space (pixel coordinates, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    /// X value in screen pixels.
    pub x: f64,
    /// Y value in screen pixels.
    pub y: f64,
}

impl ScreenPoint {
    /// Create a new screen point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in screen space (pixel coordinates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    /// Top-left corner.
    pub min: ScreenPoint,
    /// Bottom-right corner.
    pub max: ScreenPoint,
}

impl ScreenRect {
    /// Create a new screen rectangle from corners.
    pub fn new(min: ScreenPoint, max: ScreenPoint) -> Self {
        Self { min, max }
    }

    /// Rectangle anchored at the origin with the given pixel size.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(f64::from(width), f64::from(height)),
        )
    }

    /// Rectangle width in pixels.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Rectangle height in pixels.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_split_at_markers() {
        let geometry = PlotGeometry::from_polyline(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::discontinuity(1.5),
            Point::new(2.0, 0.0),
        ]);
        let runs: Vec<_> = geometry.runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[1], &[Point::new(2.0, 0.0)]);
        assert_eq!(geometry.discontinuities(), 1);
    }

    #[test]
    fn empty_geometry() {
        assert!(PlotGeometry::default().is_empty());
        let segments = PlotGeometry::from_segments(vec![Segment::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        )]);
        assert!(!segments.is_empty());
    }
}
