//! Column sampling of `y = f(x)`.

use super::{ComputeError, Sampler};
use crate::config::PipelineConfig;
use crate::generation::CancellationToken;
use crate::geom::{PlotGeometry, Point};
use crate::view::{Range, ViewportSnapshot};

/// Sample one point per screen column across the snapshot's X range.
pub(super) fn sample(
    sampler: &Sampler<'_>,
    snapshot: &ViewportSnapshot,
    token: &CancellationToken,
    config: &PipelineConfig,
) -> Result<PlotGeometry, ComputeError> {
    let columns = snapshot.pixel_width().min(config.max_columns).max(1) as usize;
    let batch = config.column_batch.max(1);
    let x_range = snapshot.x();
    let y_range = snapshot.y();
    let step = if columns > 1 {
        x_range.span() / (columns - 1) as f64
    } else {
        0.0
    };
    let excursion = y_range.span() * config.max_excursion;

    let mut polyline = Vec::with_capacity(columns + 8);
    let mut previous: Option<Point> = None;
    for column in 0..columns {
        if column % batch == 0 && token.is_cancelled() {
            return Err(ComputeError::Cancelled);
        }
        let x = if column + 1 == columns && columns > 1 {
            x_range.max
        } else {
            x_range.min + step * column as f64
        };
        let value = sampler
            .sample(Point::new(x, 0.0))?
            .filter(|y| (y - y_range.center()).abs() <= excursion);
        let Some(y) = value else {
            pen_up(&mut polyline, x);
            previous = None;
            continue;
        };
        let point = Point::new(x, y);
        if let Some(previous) = previous
            && let Some(pole_x) = pole_between(sampler, previous, point, y_range)?
        {
            pen_up(&mut polyline, pole_x);
        }
        polyline.push(point);
        previous = Some(point);
    }
    if polyline.last().is_some_and(Point::is_discontinuity) {
        polyline.pop();
    }
    Ok(PlotGeometry::from_polyline(polyline))
}

/// Insert a marker unless the pen is already up.
fn pen_up(polyline: &mut Vec<Point>, x: f64) {
    if polyline.last().is_some_and(Point::is_finite) {
        polyline.push(Point::discontinuity(x));
    }
}

/// Detect a pole between two samples that leave the viewport on opposite
/// sides, by probing the midpoint.
///
/// A continuous steep curve has its midpoint value between the two samples;
/// a pole yields an undefined value or one outside that interval.
fn pole_between(
    sampler: &Sampler<'_>,
    left: Point,
    right: Point,
    view: Range,
) -> Result<Option<f64>, ComputeError> {
    let crosses = (left.y < view.min && right.y > view.max)
        || (left.y > view.max && right.y < view.min);
    if !crosses {
        return Ok(None);
    }
    let mid_x = (left.x + right.x) * 0.5;
    Ok(match sampler.sample(Point::new(mid_x, 0.0))? {
        None => Some(mid_x),
        Some(mid_y) if (mid_y - left.y) * (mid_y - right.y) > 0.0 => Some(mid_x),
        Some(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use crate::compute::compute_geometry;
    use crate::config::PipelineConfig;
    use crate::expr::{ExprEvaluator, PlotRequest};
    use crate::generation::CancellationToken;
    use crate::geom::PlotGeometry;
    use crate::view::ViewportSnapshot;

    fn run(expression: &str, snapshot: ViewportSnapshot) -> PlotGeometry {
        compute_geometry(
            &ExprEvaluator::new(),
            &PlotRequest::expression_only(expression),
            &snapshot,
            &CancellationToken::detached(),
            &PipelineConfig::default(),
        )
        .expect("geometry")
    }

    #[test]
    fn parabola_at_five_columns() {
        let snapshot = ViewportSnapshot::new(-2.0, 2.0, -1.0, 5.0, 5, 100).expect("valid");
        let geometry = run("x*x", snapshot);
        let xs: Vec<f64> = geometry.polyline().iter().map(|point| point.x).collect();
        let ys: Vec<f64> = geometry.polyline().iter().map(|point| point.y).collect();
        assert_eq!(xs, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        for (actual, expected) in ys.iter().zip([4.0, 1.0, 0.0, 1.0, 4.0]) {
            assert!((*actual - expected).abs() < 1e-9);
        }
        assert!(geometry.segments().is_empty());
    }

    #[test]
    fn reciprocal_breaks_at_pole() {
        for width in [200, 201] {
            let snapshot = ViewportSnapshot::new(-1.0, 1.0, -10.0, 10.0, width, 100).expect("valid");
            let geometry = run("1/x", snapshot);
            let markers: Vec<f64> = geometry
                .polyline()
                .iter()
                .filter(|point| point.is_discontinuity())
                .map(|point| point.x)
                .collect();
            assert_eq!(markers.len(), 1, "width {width}");
            assert!(markers[0].abs() < 0.01, "marker at {}", markers[0]);
            for run in geometry.runs() {
                let negative = run[0].x < 0.0;
                assert!(run.iter().all(|point| (point.x < 0.0) == negative));
                for point in run {
                    assert!((point.x * point.y - 1.0).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn steep_continuous_curve_stays_connected() {
        let snapshot = ViewportSnapshot::new(-1.0, 1.0, -1.0, 1.0, 50, 50).expect("valid");
        let geometry = run("1000x", snapshot);
        assert_eq!(geometry.discontinuities(), 0);
        assert_eq!(geometry.polyline().len(), 50);
    }

    #[test]
    fn undefined_region_collapses_markers() {
        let snapshot = ViewportSnapshot::new(-2.0, 2.0, -2.0, 2.0, 41, 41).expect("valid");
        let geometry = run("sqrt(1 - x^2)", snapshot);
        assert_eq!(geometry.discontinuities(), 0);
        assert!(geometry.polyline().iter().all(|point| point.x.abs() <= 1.0 + 1e-12));

        let geometry = run("sqrt(x^2 - 1)", snapshot);
        assert_eq!(geometry.discontinuities(), 1);
        assert_eq!(geometry.runs().count(), 2);
    }

    #[test]
    fn single_column() {
        let snapshot = ViewportSnapshot::new(3.0, 4.0, 0.0, 1.0, 1, 1).expect("valid");
        let geometry = run("x + 1", snapshot);
        assert_eq!(geometry.polyline().len(), 1);
        assert!((geometry.polyline()[0].y - 4.0).abs() < 1e-9);
    }
}
