//! liveplot-curves turns a math expression and a viewport into curve geometry
//! in the background, keeping pan and zoom responsive while plotting.
//!
//! A [`PlotPipeline`] receives plot requests and viewport snapshots from any
//! thread. Bursts of triggers are debounced, superseded work is cancelled
//! through a generation counter, and only the result for the newest
//! generation reaches the [`Presenter`] on the presentation thread.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use liveplot_curves::{
//!     Generation, GeometrySink, PipelineConfig, PlotGeometry, PlotPipeline, ViewportSnapshot,
//! };
//!
//! struct Canvas;
//!
//! impl GeometrySink for Canvas {
//!     fn on_geometry_published(&mut self, generation: Generation, geometry: &PlotGeometry) {
//!         println!("{generation}: {} points", geometry.polyline().len());
//!     }
//!
//!     fn on_structural_error(&mut self, message: &str) {
//!         eprintln!("{message}");
//!     }
//! }
//!
//! # fn main() -> Result<(), liveplot_curves::PlotError> {
//! let (pipeline, mut presenter) = PlotPipeline::with_default_evaluator(PipelineConfig::default())?;
//! pipeline.on_viewport_changed(ViewportSnapshot::new(-5.0, 5.0, -5.0, 5.0, 800, 800)?);
//! pipeline.set_plot_request("a*sin(x)", [("a", "2")]);
//! presenter.wait(&mut Canvas, Duration::from_secs(1));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod axis;
pub mod compute;
pub mod config;
pub mod error;
pub mod expr;
pub mod generation;
pub mod geom;
pub mod interaction;
pub mod pipeline;
pub mod publish;
pub mod render;
mod schedule;
pub mod transform;
pub mod view;
mod worker;

pub use compute::{ComputeError, compute_geometry};
pub use config::PipelineConfig;
pub use error::{DomainError, EvalError, ParseError, PlotError};
pub use expr::{ArithmeticEvaluator, CurveKind, ExprEvaluator, PlotRequest, Variables};
pub use generation::{CancellationToken, Generation};
pub use geom::{PlotGeometry, Point, ScreenPoint, ScreenRect, Segment};
pub use interaction::{ViewportController, ViewportObserver};
pub use pipeline::PlotPipeline;
pub use publish::{GeometrySink, PipelinePhase, Presenter};
pub use render::{LineSegment, build_line_segments};
pub use transform::{Transform, ZoomLimits};
pub use view::{Range, ViewportSnapshot};
