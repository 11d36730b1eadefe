//! Marching-squares extraction of `F(x, y) = 0`.

use super::{ComputeError, Sampler};
use crate::axis::{next_nice_step, nice_step};
use crate::config::PipelineConfig;
use crate::generation::CancellationToken;
use crate::geom::{PlotGeometry, Point, Segment};
use crate::view::ViewportSnapshot;

/// Sampling grid aligned to multiples of a nice step on each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Grid {
    step_x: f64,
    step_y: f64,
    first_x: f64,
    first_y: f64,
    columns: usize,
    rows: usize,
}

impl Grid {
    /// Grid of roughly `cell_pixels`-sized cells, coarsened until it fits
    /// `max_grid_cells`.
    fn for_snapshot(snapshot: &ViewportSnapshot, config: &PipelineConfig) -> Option<Self> {
        let cell_pixels = config.cell_pixels.max(f64::MIN_POSITIVE);
        let mut step_x = nice_step(snapshot.world_per_pixel_x() * cell_pixels)?;
        let mut step_y = nice_step(snapshot.world_per_pixel_y() * cell_pixels)?;
        loop {
            let first_x = (snapshot.min_x() / step_x).floor();
            let first_y = (snapshot.min_y() / step_y).floor();
            let columns = ((snapshot.max_x() / step_x).ceil() - first_x).max(1.0);
            let rows = ((snapshot.max_y() / step_y).ceil() - first_y).max(1.0);
            if columns * rows <= config.max_grid_cells.max(1) as f64 {
                return Some(Self {
                    step_x,
                    step_y,
                    first_x,
                    first_y,
                    columns: columns as usize,
                    rows: rows as usize,
                });
            }
            step_x = next_nice_step(step_x)?;
            step_y = next_nice_step(step_y)?;
        }
    }

    fn x(&self, column: usize) -> f64 {
        (self.first_x + column as f64) * self.step_x
    }

    fn y(&self, row: usize) -> f64 {
        (self.first_y + row as f64) * self.step_y
    }
}

/// Contour the zero set of `F` over the snapshot.
pub(super) fn extract(
    sampler: &Sampler<'_>,
    snapshot: &ViewportSnapshot,
    token: &CancellationToken,
    config: &PipelineConfig,
) -> Result<PlotGeometry, ComputeError> {
    let Some(grid) = Grid::for_snapshot(snapshot, config) else {
        return Ok(PlotGeometry::default());
    };
    let nodes = grid.columns + 1;
    let mut below: Vec<Option<f64>> = Vec::with_capacity(nodes);
    let mut above: Vec<Option<f64>> = Vec::with_capacity(nodes);
    let mut segments = Vec::new();

    for row in 0..=grid.rows {
        if token.is_cancelled() {
            return Err(ComputeError::Cancelled);
        }
        let y = grid.y(row);
        above.clear();
        for column in 0..nodes {
            above.push(sampler.sample(Point::new(grid.x(column), y))?);
        }
        if row > 0 {
            let y0 = grid.y(row - 1);
            for column in 0..grid.columns {
                let (Some(bl), Some(br), Some(tl), Some(tr)) = (
                    below[column],
                    below[column + 1],
                    above[column],
                    above[column + 1],
                ) else {
                    continue;
                };
                let cell = Cell {
                    x0: grid.x(column),
                    x1: grid.x(column + 1),
                    y0,
                    y1: y,
                    tl,
                    tr,
                    br,
                    bl,
                };
                cell.contour(&mut segments);
            }
        }
        std::mem::swap(&mut below, &mut above);
    }
    Ok(PlotGeometry::from_segments(segments))
}

/// One grid cell with corner values; `y1` is the upper edge.
#[derive(Debug, Clone, Copy)]
struct Cell {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    tl: f64,
    tr: f64,
    br: f64,
    bl: f64,
}

impl Cell {
    /// Emit zero, one, or two segments for this cell.
    fn contour(&self, out: &mut Vec<Segment>) {
        let mut case = 0u8;
        if self.tl >= 0.0 {
            case |= 1;
        }
        if self.tr >= 0.0 {
            case |= 2;
        }
        if self.br >= 0.0 {
            case |= 4;
        }
        if self.bl >= 0.0 {
            case |= 8;
        }
        if case == 0 || case == 15 {
            return;
        }

        let top = || {
            interpolate(
                Point::new(self.x0, self.y1),
                Point::new(self.x1, self.y1),
                self.tl,
                self.tr,
            )
        };
        let right = || {
            interpolate(
                Point::new(self.x1, self.y1),
                Point::new(self.x1, self.y0),
                self.tr,
                self.br,
            )
        };
        let bottom = || {
            interpolate(
                Point::new(self.x0, self.y0),
                Point::new(self.x1, self.y0),
                self.bl,
                self.br,
            )
        };
        let left = || {
            interpolate(
                Point::new(self.x0, self.y1),
                Point::new(self.x0, self.y0),
                self.tl,
                self.bl,
            )
        };
        let center_positive = (self.tl + self.tr + self.br + self.bl) * 0.25 >= 0.0;

        match case {
            1 | 14 => out.push(Segment::new(left(), top())),
            2 | 13 => out.push(Segment::new(top(), right())),
            3 | 12 => out.push(Segment::new(left(), right())),
            4 | 11 => out.push(Segment::new(right(), bottom())),
            6 | 9 => out.push(Segment::new(top(), bottom())),
            7 | 8 => out.push(Segment::new(left(), bottom())),
            // Saddles: the centre decides which diagonal is connected.
            5 if center_positive => {
                out.push(Segment::new(top(), right()));
                out.push(Segment::new(left(), bottom()));
            }
            5 => {
                out.push(Segment::new(left(), top()));
                out.push(Segment::new(right(), bottom()));
            }
            10 if center_positive => {
                out.push(Segment::new(left(), top()));
                out.push(Segment::new(right(), bottom()));
            }
            10 => {
                out.push(Segment::new(top(), right()));
                out.push(Segment::new(left(), bottom()));
            }
            _ => {}
        }
    }
}

/// Zero crossing of the linear interpolant along an edge.
fn interpolate(a: Point, b: Point, value_a: f64, value_b: f64) -> Point {
    let delta = value_a - value_b;
    if delta.abs() <= f64::EPSILON * value_a.abs().max(value_b.abs()) {
        return a.midpoint(b);
    }
    let t = (value_a / delta).clamp(0.0, 1.0);
    Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}
