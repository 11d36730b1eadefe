//! Coordinate transforms between world and screen space.
//!
//! World space is the math plane with y up; screen space is pixels with y
//! down. One uniform `scale` (pixels per world unit) links the two.

use crate::error::PlotError;
use crate::geom::{Point, ScreenPoint};
use crate::view::ViewportSnapshot;

/// Allowed zoom range, in pixels per world unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    /// Smallest scale (most zoomed out).
    pub min_scale: f64,
    /// Largest scale (most zoomed in).
    pub max_scale: f64,
}

impl ZoomLimits {
    /// Clamp a scale into the limits. Non-finite input yields `None`.
    pub fn clamp(&self, scale: f64) -> Option<f64> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        Some(scale.clamp(self.min_scale, self.max_scale))
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min_scale: 1e-6,
            max_scale: 1e9,
        }
    }
}

/// Affine map from world into screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    origin_x: f64,
    origin_y: f64,
    scale: f64,
}

impl Transform {
    /// Create a transform from the screen position of the world origin and a
    /// scale in pixels per world unit.
    pub fn new(origin_x: f64, origin_y: f64, scale: f64) -> Option<Self> {
        if !(origin_x.is_finite() && origin_y.is_finite() && scale.is_finite()) || scale <= 0.0 {
            return None;
        }
        Some(Self {
            origin_x,
            origin_y,
            scale,
        })
    }

    /// Transform that shows the whole snapshot box centred on its surface.
    ///
    /// The scale is the smaller of the two axis densities, so a box with a
    /// different aspect ratio than the surface gains margin on one axis.
    pub fn fit(snapshot: &ViewportSnapshot, limits: ZoomLimits) -> Option<Self> {
        let width = f64::from(snapshot.pixel_width());
        let height = f64::from(snapshot.pixel_height());
        let scale_x = width / snapshot.x().span();
        let scale_y = height / snapshot.y().span();
        let scale = limits.clamp(scale_x.min(scale_y))?;
        let origin_x = width * 0.5 - snapshot.x().center() * scale;
        let origin_y = height * 0.5 + snapshot.y().center() * scale;
        Self::new(origin_x, origin_y, scale)
    }

    /// Pixels per world unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Map a world point into screen space.
    pub fn world_to_screen(&self, point: Point) -> ScreenPoint {
        ScreenPoint::new(
            self.origin_x + point.x * self.scale,
            self.origin_y - point.y * self.scale,
        )
    }

    /// Map a screen point into world space.
    pub fn screen_to_world(&self, point: ScreenPoint) -> Point {
        Point::new(
            (point.x - self.origin_x) / self.scale,
            (self.origin_y - point.y) / self.scale,
        )
    }

    /// Shift the view by a pixel delta (content follows the pointer).
    pub fn pan_by(&self, dx: f64, dy: f64) -> Self {
        Self {
            origin_x: self.origin_x + dx,
            origin_y: self.origin_y + dy,
            scale: self.scale,
        }
    }

    /// Change the scale while keeping the world point under `cursor` fixed.
    ///
    /// The target scale is clamped into `limits`; non-finite targets leave
    /// the transform unchanged.
    pub fn zoom_at(&self, cursor: ScreenPoint, scale: f64, limits: ZoomLimits) -> Self {
        let Some(scale) = limits.clamp(scale) else {
            return *self;
        };
        let anchor = self.screen_to_world(cursor);
        Self {
            origin_x: cursor.x - anchor.x * scale,
            origin_y: cursor.y + anchor.y * scale,
            scale,
        }
    }

    /// Multiply the scale by `factor` around `cursor`.
    pub fn zoom_by(&self, cursor: ScreenPoint, factor: f64, limits: ZoomLimits) -> Self {
        self.zoom_at(cursor, self.scale * factor, limits)
    }

    /// Capture the visible world box for a surface of the given pixel size.
    pub fn snapshot(&self, pixel_width: u32, pixel_height: u32) -> Result<ViewportSnapshot, PlotError> {
        let top_left = self.screen_to_world(ScreenPoint::new(0.0, 0.0));
        let bottom_right = self.screen_to_world(ScreenPoint::new(
            f64::from(pixel_width),
            f64::from(pixel_height),
        ));
        ViewportSnapshot::new(
            top_left.x,
            bottom_right.x,
            bottom_right.y,
            top_left.y,
            pixel_width,
            pixel_height,
        )
    }
}
