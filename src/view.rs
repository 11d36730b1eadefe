//! Data ranges and viewport snapshots.

use crate::error::PlotError;

/// Numeric range with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl Range {
    /// Create a new range, swapping bounds if needed.
    pub fn new(mut min: f64, mut max: f64) -> Self {
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        Self { min, max }
    }

    /// Span of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Midpoint of the range.
    pub fn center(&self) -> f64 {
        (self.min + self.max) * 0.5
    }

}

/// Immutable capture of the visible world box and its pixel size.
///
/// Snapshots are created by the UI layer on every pan, zoom, or resize and
/// handed by value to the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSnapshot {
    x: Range,
    y: Range,
    pixel_width: u32,
    pixel_height: u32,
}

impl ViewportSnapshot {
    /// Create a snapshot from world bounds and a pixel size.
    ///
    /// Bounds must be finite with `min < max` on both axes and both pixel
    /// dimensions must be at least one.
    pub fn new(
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Result<Self, PlotError> {
        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return Err(PlotError::InvalidViewport {
                reason: "bounds must be finite",
            });
        }
        if min_x >= max_x {
            return Err(PlotError::InvalidViewport {
                reason: "min_x must be below max_x",
            });
        }
        if min_y >= max_y {
            return Err(PlotError::InvalidViewport {
                reason: "min_y must be below max_y",
            });
        }
        if pixel_width == 0 || pixel_height == 0 {
            return Err(PlotError::InvalidViewport {
                reason: "pixel size must be at least 1x1",
            });
        }
        Ok(Self {
            x: Range { min: min_x, max: max_x },
            y: Range { min: min_y, max: max_y },
            pixel_width,
            pixel_height,
        })
    }

    /// Create a snapshot from two ranges.
    pub fn from_ranges(
        x: Range,
        y: Range,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Result<Self, PlotError> {
        Self::new(x.min, x.max, y.min, y.max, pixel_width, pixel_height)
    }

    /// Visible X range.
    pub fn x(&self) -> Range {
        self.x
    }

    /// Visible Y range.
    pub fn y(&self) -> Range {
        self.y
    }

    /// Left world bound.
    pub fn min_x(&self) -> f64 {
        self.x.min
    }

    /// Right world bound.
    pub fn max_x(&self) -> f64 {
        self.x.max
    }

    /// Bottom world bound.
    pub fn min_y(&self) -> f64 {
        self.y.min
    }

    /// Top world bound.
    pub fn max_y(&self) -> f64 {
        self.y.max
    }

    /// Width of the rendering surface in pixels.
    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    /// Height of the rendering surface in pixels.
    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    /// World units covered by one horizontal pixel.
    pub fn world_per_pixel_x(&self) -> f64 {
        self.x.span() / f64::from(self.pixel_width)
    }

    /// World units covered by one vertical pixel.
    pub fn world_per_pixel_y(&self) -> f64 {
        self.y.span() / f64::from(self.pixel_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_swaps_bounds() {
        let range = Range::new(3.0, -1.0);
        assert_eq!(range.min, -1.0);
        assert_eq!(range.max, 3.0);
        assert_eq!(range.center(), 1.0);
    }

    #[test]
    fn snapshot_rejects_degenerate_bounds() {
        assert!(ViewportSnapshot::new(1.0, 1.0, 0.0, 1.0, 10, 10).is_err());
        assert!(ViewportSnapshot::new(0.0, 1.0, 2.0, -2.0, 10, 10).is_err());
        assert!(ViewportSnapshot::new(0.0, f64::INFINITY, 0.0, 1.0, 10, 10).is_err());
        assert!(ViewportSnapshot::new(0.0, 1.0, 0.0, 1.0, 0, 10).is_err());
    }

    #[test]
    fn snapshot_pixel_density() {
        let snapshot = ViewportSnapshot::new(-2.0, 2.0, -1.0, 1.0, 400, 100).expect("valid");
        assert_eq!(snapshot.world_per_pixel_x(), 0.01);
        assert_eq!(snapshot.world_per_pixel_y(), 0.02);
    }
}
