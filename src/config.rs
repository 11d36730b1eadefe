//! Pipeline configuration.

use std::time::Duration;

use crate::transform::ZoomLimits;

/// Tuning knobs for scheduling and curve computation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Debounce delay after a new plot request.
    pub request_delay: Duration,
    /// Debounce delay after a viewport change (drag, zoom, resize).
    pub viewport_delay: Duration,
    /// Explicit sampling polls cancellation once per this many columns.
    pub column_batch: usize,
    /// Upper bound on explicit samples per pass.
    pub max_columns: u32,
    /// Target implicit grid cell size in pixels before nice-step rounding.
    pub cell_pixels: f64,
    /// Upper bound on implicit grid cells per pass.
    pub max_grid_cells: usize,
    /// Explicit samples farther than this many viewport heights from the
    /// viewport centre become discontinuities.
    pub max_excursion: f64,
    /// Zoom range for transforms built by the viewport controller.
    pub zoom_limits: ZoomLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::ZERO,
            viewport_delay: Duration::from_millis(40),
            column_batch: 32,
            max_columns: 8192,
            cell_pixels: 1.0,
            max_grid_cells: 1 << 21,
            max_excursion: 1e6,
            zoom_limits: ZoomLimits::default(),
        }
    }
}
