//! Viewport interaction: panning, zooming and resizing.
//!
//! [`ViewportController`] owns the live [`Transform`] and surface size on the
//! presentation thread. Every accepted change is captured as a
//! [`ViewportSnapshot`] and pushed to the subscribed observers, typically a
//! [`PlotPipeline`](crate::PlotPipeline).

use std::sync::Arc;

use crate::error::PlotError;
use crate::geom::{ScreenPoint, ScreenRect};
use crate::transform::{Transform, ZoomLimits};
use crate::view::{Range, ViewportSnapshot};

/// Receiver of viewport changes.
pub trait ViewportObserver: Send + Sync {
    /// Called with the snapshot of every accepted change.
    fn viewport_changed(&self, snapshot: ViewportSnapshot);
}

impl<F> ViewportObserver for F
where
    F: Fn(ViewportSnapshot) + Send + Sync,
{
    fn viewport_changed(&self, snapshot: ViewportSnapshot) {
        self(snapshot);
    }
}

/// Drag rectangles smaller than this many pixels on either axis are ignored.
const MIN_ZOOM_RECT_PIXELS: f64 = 2.0;

/// Interactive owner of the transform and surface size.
pub struct ViewportController {
    transform: Transform,
    width: u32,
    height: u32,
    limits: ZoomLimits,
    observers: Vec<Arc<dyn ViewportObserver>>,
}

impl std::fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportController")
            .field("transform", &self.transform)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("limits", &self.limits)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ViewportController {
    /// Start with a transform fitted to `initial`.
    pub fn new(initial: ViewportSnapshot, limits: ZoomLimits) -> Result<Self, PlotError> {
        let transform = Transform::fit(&initial, limits).ok_or(PlotError::InvalidViewport {
            reason: "snapshot cannot be fitted",
        })?;
        Ok(Self {
            transform,
            width: initial.pixel_width(),
            height: initial.pixel_height(),
            limits,
            observers: Vec::new(),
        })
    }

    /// Add an observer. It is not called for the current state.
    pub fn subscribe(&mut self, observer: Arc<dyn ViewportObserver>) {
        self.observers.push(observer);
    }

    /// Current transform.
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> Result<ViewportSnapshot, PlotError> {
        self.transform.snapshot(self.width, self.height)
    }

    /// Pan by a pixel delta; the content follows the pointer.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> Result<ViewportSnapshot, PlotError> {
        let transform = self.transform.pan_by(dx, dy);
        self.apply(transform, self.width, self.height)
    }

    /// Multiply the scale by `factor`, keeping the world point under
    /// `cursor` fixed.
    pub fn zoom_by(
        &mut self,
        cursor: ScreenPoint,
        factor: f64,
    ) -> Result<ViewportSnapshot, PlotError> {
        let transform = self.transform.zoom_by(cursor, factor, self.limits);
        self.apply(transform, self.width, self.height)
    }

    /// Zoom so the world box under a dragged rectangle fills the surface.
    ///
    /// Rectangles thinner than two pixels leave the view unchanged.
    pub fn zoom_to_rect(&mut self, rect: ScreenRect) -> Result<ViewportSnapshot, PlotError> {
        if rect.width().abs() < MIN_ZOOM_RECT_PIXELS || rect.height().abs() < MIN_ZOOM_RECT_PIXELS
        {
            return self.snapshot();
        }
        let a = self.transform.screen_to_world(rect.min);
        let b = self.transform.screen_to_world(rect.max);
        let target = ViewportSnapshot::from_ranges(
            Range::new(a.x, b.x),
            Range::new(a.y, b.y),
            self.width,
            self.height,
        )?;
        let transform = Transform::fit(&target, self.limits).ok_or(PlotError::InvalidViewport {
            reason: "rectangle cannot be fitted",
        })?;
        self.apply(transform, self.width, self.height)
    }

    /// Change the surface size. The world origin keeps its screen position.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<ViewportSnapshot, PlotError> {
        self.apply(self.transform, width, height)
    }

    /// Validate, commit and broadcast a new state.
    fn apply(
        &mut self,
        transform: Transform,
        width: u32,
        height: u32,
    ) -> Result<ViewportSnapshot, PlotError> {
        let snapshot = transform.snapshot(width, height)?;
        self.transform = transform;
        self.width = width;
        self.height = height;
        for observer in &self.observers {
            observer.viewport_changed(snapshot);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    fn controller() -> ViewportController {
        let initial = ViewportSnapshot::new(-2.0, 2.0, -1.5, 1.5, 400, 300).expect("valid");
        ViewportController::new(initial, ZoomLimits::default()).expect("controller")
    }

    #[test]
    fn pan_notifies_observers() {
        let mut controller = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.subscribe(Arc::new(move |snapshot: ViewportSnapshot| {
            sink.lock().push(snapshot);
        }));

        let snapshot = controller.pan_by(100.0, 0.0).expect("pan");
        assert!((snapshot.min_x() + 3.0).abs() < 1e-12);
        assert!((snapshot.max_x() - 1.0).abs() < 1e-12);
        assert_eq!(seen.lock().as_slice(), &[snapshot]);
    }

    #[test]
    fn zoom_keeps_cursor_anchor() {
        let mut controller = controller();
        let cursor = ScreenPoint::new(300.0, 100.0);
        let before = controller.transform().screen_to_world(cursor);
        let snapshot = controller.zoom_by(cursor, 4.0).expect("zoom");
        let after = controller.transform().screen_to_world(cursor);
        assert!((before.x - after.x).abs() < 1e-12);
        assert!((before.y - after.y).abs() < 1e-12);
        assert!((snapshot.x().span() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zoom_to_rect_shows_dragged_box() {
        let mut controller = controller();
        let rect = ScreenRect::new(ScreenPoint::new(200.0, 0.0), ScreenPoint::new(400.0, 150.0));
        let snapshot = controller.zoom_to_rect(rect).expect("zoom");
        assert!(snapshot.min_x().abs() < 1e-12);
        assert!((snapshot.max_x() - 2.0).abs() < 1e-12);
        assert!(snapshot.min_y().abs() < 1e-12);
        assert!((snapshot.max_y() - 1.5).abs() < 1e-12);

        let tiny = ScreenRect::new(ScreenPoint::new(10.0, 10.0), ScreenPoint::new(11.0, 50.0));
        assert_eq!(controller.zoom_to_rect(tiny).expect("unchanged"), snapshot);
    }

    #[test]
    fn zero_size_resize_is_rejected() {
        let mut controller = controller();
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        controller.subscribe(Arc::new(move |_: ViewportSnapshot| *counter.lock() += 1));

        assert!(controller.resize(0, 300).is_err());
        assert_eq!(controller.size(), (400, 300));
        assert_eq!(*calls.lock(), 0);

        let snapshot = controller.resize(800, 300).expect("resize");
        assert!((snapshot.min_x() + 2.0).abs() < 1e-12);
        assert!((snapshot.max_x() - 6.0).abs() < 1e-12);
        assert_eq!(*calls.lock(), 1);
    }
}
