//! Screen-space projection of published geometry.
//!
//! Presentation code draws [`LineSegment`]s. They are produced here from a
//! [`PlotGeometry`] and the live [`Transform`], clipped to the drawing area.
//! Polylines are broken at discontinuity markers so no segment is ever drawn
//! across a pole or an undefined region.

use crate::geom::{PlotGeometry, Point, ScreenPoint, ScreenRect};
use crate::transform::Transform;

/// A line segment in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    /// Segment start.
    pub start: ScreenPoint,
    /// Segment end.
    pub end: ScreenPoint,
}

impl LineSegment {
    /// Create a new line segment.
    pub fn new(start: ScreenPoint, end: ScreenPoint) -> Self {
        Self { start, end }
    }
}

/// Project `geometry` through `transform`, keeping the parts inside `clip`.
///
/// `out` is cleared first so callers can reuse one buffer per frame.
pub fn build_line_segments(
    geometry: &PlotGeometry,
    transform: &Transform,
    clip: ScreenRect,
    out: &mut Vec<LineSegment>,
) {
    out.clear();
    for run in geometry.runs() {
        for window in run.windows(2) {
            push_clipped(window[0], window[1], transform, clip, out);
        }
    }
    for segment in geometry.segments() {
        push_clipped(segment.a, segment.b, transform, clip, out);
    }
}

fn push_clipped(
    a: Point,
    b: Point,
    transform: &Transform,
    clip: ScreenRect,
    out: &mut Vec<LineSegment>,
) {
    if !(a.is_finite() && b.is_finite()) {
        return;
    }
    let start = transform.world_to_screen(a);
    let end = transform.world_to_screen(b);
    if let Some((start, end)) = clip_segment(start, end, clip) {
        out.push(LineSegment::new(start, end));
    }
}

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const TOP: u8 = 4;
const BOTTOM: u8 = 8;

/// Cohen-Sutherland clipping against an axis-aligned rectangle.
fn clip_segment(
    mut start: ScreenPoint,
    mut end: ScreenPoint,
    rect: ScreenRect,
) -> Option<(ScreenPoint, ScreenPoint)> {
    let mut out_start = region_code(start, rect);
    let mut out_end = region_code(end, rect);

    loop {
        if (out_start | out_end) == 0 {
            return Some((start, end));
        }
        if (out_start & out_end) != 0 {
            return None;
        }

        let out_code = if out_start != 0 { out_start } else { out_end };
        let point = if (out_code & TOP) != 0 {
            ScreenPoint::new(
                start.x + (end.x - start.x) * (rect.min.y - start.y) / (end.y - start.y),
                rect.min.y,
            )
        } else if (out_code & BOTTOM) != 0 {
            ScreenPoint::new(
                start.x + (end.x - start.x) * (rect.max.y - start.y) / (end.y - start.y),
                rect.max.y,
            )
        } else if (out_code & RIGHT) != 0 {
            ScreenPoint::new(
                rect.max.x,
                start.y + (end.y - start.y) * (rect.max.x - start.x) / (end.x - start.x),
            )
        } else {
            ScreenPoint::new(
                rect.min.x,
                start.y + (end.y - start.y) * (rect.min.x - start.x) / (end.x - start.x),
            )
        };

        if out_code == out_start {
            start = point;
            out_start = region_code(start, rect);
        } else {
            end = point;
            out_end = region_code(end, rect);
        }
    }
}

fn region_code(point: ScreenPoint, rect: ScreenRect) -> u8 {
    let mut code = 0;
    if point.x < rect.min.x {
        code |= LEFT;
    } else if point.x > rect.max.x {
        code |= RIGHT;
    }
    if point.y < rect.min.y {
        code |= TOP;
    } else if point.y > rect.max.y {
        code |= BOTTOM;
    }
    code
}
