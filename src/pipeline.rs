//! The public face of the pipeline.
//!
//! [`PlotPipeline`] accepts the two triggers (a new plot request and a new
//! viewport) from any thread, and owns the scheduler and worker threads.
//! Output reaches the presentation thread through the [`Presenter`] returned
//! alongside it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::unbounded;
use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::config::PipelineConfig;
use crate::error::PlotError;
use crate::expr::{ArithmeticEvaluator, ExprEvaluator, PlotRequest};
use crate::generation::Generation;
use crate::interaction::ViewportObserver;
use crate::publish::{self, PhaseTracker, PipelinePhase, Presenter, Publisher};
use crate::schedule::Scheduler;
use crate::view::ViewportSnapshot;
use crate::worker::Worker;

/// Cloneable handle to a running pipeline.
///
/// Dropping the last handle disposes the pipeline.
#[derive(Clone)]
pub struct PlotPipeline {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PlotPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotPipeline")
            .field("generation", &self.current_generation())
            .field("phase", &self.phase())
            .finish()
    }
}

struct Shared {
    config: PipelineConfig,
    scheduler: Scheduler,
    publisher: Publisher,
    phase: Arc<PhaseTracker>,
    inputs: Mutex<Inputs>,
    rejected: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

#[derive(Debug, Default)]
struct Inputs {
    next_request_id: u64,
    request: Option<(u64, PlotRequest)>,
    snapshot: Option<ViewportSnapshot>,
}

impl PlotPipeline {
    /// Start a pipeline driven by `evaluator`.
    pub fn new(
        evaluator: Arc<dyn ArithmeticEvaluator>,
        config: PipelineConfig,
    ) -> Result<(Self, Presenter), PlotError> {
        let (jobs_tx, jobs_rx) = unbounded();
        let scheduler = Scheduler::spawn(jobs_tx)?;
        let (publisher, presenter) = publish::channel(scheduler.watch());
        let phase = Arc::new(PhaseTracker::new(scheduler.watch()));
        let rejected = Arc::new(AtomicU64::new(0));
        let worker = Worker {
            jobs: jobs_rx,
            evaluator,
            publisher: publisher.clone(),
            phase: Arc::clone(&phase),
            rejected: Arc::clone(&rejected),
            config: config.clone(),
        }
        .spawn()?;
        debug!("pipeline started");
        let shared = Shared {
            config,
            scheduler,
            publisher,
            phase,
            inputs: Mutex::new(Inputs {
                next_request_id: 1,
                ..Inputs::default()
            }),
            rejected,
            worker: Mutex::new(Some(worker)),
            disposed: AtomicBool::new(false),
        };
        Ok((
            Self {
                shared: Arc::new(shared),
            },
            presenter,
        ))
    }

    /// Start a pipeline with the built-in [`ExprEvaluator`].
    pub fn with_default_evaluator(config: PipelineConfig) -> Result<(Self, Presenter), PlotError> {
        Self::new(Arc::new(ExprEvaluator::new()), config)
    }

    /// Replace the plot request.
    pub fn set_plot_request<I, K, V>(
        &self,
        expression: impl Into<String>,
        variables: I,
    ) -> Generation
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.set_request(PlotRequest::new(expression, variables))
    }

    /// Replace the plot request with a prepared one.
    pub fn set_request(&self, request: PlotRequest) -> Generation {
        let shared = &self.shared;
        let mut inputs = shared.inputs.lock();
        if shared.is_disposed() {
            trace!("request after dispose ignored");
            return shared.scheduler.current();
        }
        let id = inputs.next_request_id;
        inputs.next_request_id += 1;
        inputs.request = Some((id, request));
        shared.trigger(&inputs, shared.config.request_delay)
    }

    /// Record a new viewport and schedule a recomputation.
    pub fn on_viewport_changed(&self, snapshot: ViewportSnapshot) -> Generation {
        let shared = &self.shared;
        let mut inputs = shared.inputs.lock();
        if shared.is_disposed() {
            trace!("viewport change after dispose ignored");
            return shared.scheduler.current();
        }
        inputs.snapshot = Some(snapshot);
        shared.trigger(&inputs, shared.config.viewport_delay)
    }

    /// Cancel all work, forget the request and clear published geometry.
    pub fn clear(&self) -> Generation {
        let shared = &self.shared;
        let mut inputs = shared.inputs.lock();
        if shared.is_disposed() {
            return shared.scheduler.current();
        }
        inputs.request = None;
        let generation = shared
            .phase
            .trigger(PipelinePhase::Idle, || shared.scheduler.invalidate());
        shared.publisher.clear();
        debug!("cleared at {generation}");
        generation
    }

    /// Stop background threads. Idempotent; later triggers are ignored.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// The live generation.
    pub fn current_generation(&self) -> Generation {
        self.shared.scheduler.current()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> PipelinePhase {
        self.shared.phase.get()
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}

impl ViewportObserver for PlotPipeline {
    fn viewport_changed(&self, snapshot: ViewportSnapshot) {
        self.on_viewport_changed(snapshot);
    }
}

impl Shared {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Mint for a trigger and schedule when both inputs are present.
    ///
    /// A request whose parse failure was already reported is not
    /// recomputed; the mint still cancels whatever was in flight.
    fn trigger(&self, inputs: &Inputs, delay: Duration) -> Generation {
        match (&inputs.request, inputs.snapshot) {
            (Some((id, request)), Some(snapshot))
                if self.rejected.load(Ordering::Acquire) != *id =>
            {
                self.phase.trigger(PipelinePhase::Scheduled, || {
                    self.scheduler.schedule(*id, request.clone(), snapshot, delay)
                })
            }
            _ => self
                .phase
                .trigger(PipelinePhase::Idle, || self.scheduler.invalidate()),
        }
    }

    /// Triggers check the flag under the inputs lock, so none can mint
    /// once this has flipped it.
    fn dispose(&self) {
        let already = {
            let _inputs = self.inputs.lock();
            self.disposed.swap(true, Ordering::AcqRel)
        };
        if already {
            return;
        }
        let generation = self.scheduler.shutdown();
        self.phase.set(PipelinePhase::Disposed);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!("worker thread panicked");
        }
        debug!("pipeline disposed at {generation}");
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use super::*;
    use crate::error::{EvalError, ParseError};
    use crate::expr::{CurveKind, Variables};
    use crate::geom::{PlotGeometry, Point};
    use crate::publish::GeometrySink;

    /// Built-in evaluator that counts passes and can be slowed down.
    #[derive(Default)]
    struct SlowEvaluator {
        inner: ExprEvaluator,
        passes: AtomicUsize,
        delay: Option<Duration>,
        classify_delay: Option<Duration>,
    }

    impl ArithmeticEvaluator for SlowEvaluator {
        fn classify(
            &self,
            expression: &str,
            variables: &Variables,
        ) -> Result<CurveKind, ParseError> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.classify_delay {
                thread::sleep(delay);
            }
            self.inner.classify(expression, variables)
        }

        fn evaluate(
            &self,
            expression: &str,
            variables: &Variables,
            at: Point,
        ) -> Result<f64, EvalError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            self.inner.evaluate(expression, variables, at)
        }
    }

    #[derive(Default)]
    struct Recorder {
        published: Vec<(Generation, PlotGeometry)>,
        errors: Vec<String>,
        cleared: usize,
    }

    impl GeometrySink for Recorder {
        fn on_geometry_published(&mut self, generation: Generation, geometry: &PlotGeometry) {
            self.published.push((generation, geometry.clone()));
        }

        fn on_structural_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }

        fn on_cleared(&mut self) {
            self.cleared += 1;
        }
    }

    fn snapshot(min_x: f64) -> ViewportSnapshot {
        ViewportSnapshot::new(min_x, min_x + 2.0, -5.0, 5.0, 64, 64).expect("valid")
    }

    fn start(
        evaluator: &Arc<SlowEvaluator>,
        viewport_delay: Duration,
    ) -> (PlotPipeline, Presenter) {
        let config = PipelineConfig {
            viewport_delay,
            ..PipelineConfig::default()
        };
        let evaluator: Arc<dyn ArithmeticEvaluator> = evaluator.clone();
        PlotPipeline::new(evaluator, config).expect("pipeline")
    }

    /// Pump the presenter until `done` holds or five seconds pass.
    fn pump_until(
        presenter: &mut Presenter,
        recorder: &mut Recorder,
        done: impl Fn(&Recorder) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(&*recorder) && Instant::now() < deadline {
            presenter.wait(recorder, Duration::from_millis(20));
        }
        assert!(done(&*recorder), "condition not reached in time");
    }

    fn wait_for_phase(pipeline: &PlotPipeline, phase: PipelinePhase) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.phase() != phase && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pipeline.phase(), phase);
    }

    #[test]
    fn viewport_burst_computes_once() {
        let evaluator = Arc::new(SlowEvaluator::default());
        let (pipeline, mut presenter) = start(&evaluator, Duration::from_millis(100));
        let mut recorder = Recorder::default();

        pipeline.on_viewport_changed(snapshot(0.0));
        pipeline.set_plot_request("x", std::iter::empty::<(String, String)>());
        pump_until(&mut presenter, &mut recorder, |r| r.published.len() == 1);
        wait_for_phase(&pipeline, PipelinePhase::Idle);
        let before = evaluator.passes.load(Ordering::SeqCst);

        let mut last = Generation::INITIAL;
        for step in 1..=20 {
            last = pipeline.on_viewport_changed(snapshot(f64::from(step)));
        }
        pump_until(&mut presenter, &mut recorder, |r| r.published.len() == 2);
        thread::sleep(Duration::from_millis(250));
        presenter.dispatch(&mut recorder);

        assert_eq!(evaluator.passes.load(Ordering::SeqCst) - before, 1);
        assert_eq!(recorder.published.len(), 2);
        let (generation, geometry) = &recorder.published[1];
        assert_eq!(*generation, last);
        assert_eq!(geometry.polyline()[0].x, 20.0);
        assert_eq!(presenter.generation(), Some(last));
    }

    #[test]
    fn clear_cancels_running_computation() {
        let evaluator = Arc::new(SlowEvaluator {
            delay: Some(Duration::from_millis(1)),
            ..SlowEvaluator::default()
        });
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let mut recorder = Recorder::default();

        let wide = ViewportSnapshot::new(-1.0, 1.0, -1.0, 1.0, 4000, 100).expect("valid");
        pipeline.on_viewport_changed(wide);
        pipeline.set_plot_request("x", std::iter::empty::<(String, String)>());
        wait_for_phase(&pipeline, PipelinePhase::Computing);
        pipeline.clear();

        pump_until(&mut presenter, &mut recorder, |r| r.cleared == 1);
        wait_for_phase(&pipeline, PipelinePhase::Idle);
        presenter.wait(&mut recorder, Duration::from_millis(100));
        assert!(recorder.published.is_empty());
        assert!(presenter.geometry().is_none());

        // The request is gone, so panning does not bring the curve back.
        pipeline.on_viewport_changed(snapshot(0.0));
        presenter.wait(&mut recorder, Duration::from_millis(150));
        assert!(recorder.published.is_empty());
    }

    #[test]
    fn structural_error_keeps_last_geometry() {
        let evaluator = Arc::new(SlowEvaluator::default());
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let mut recorder = Recorder::default();

        pipeline.on_viewport_changed(snapshot(0.0));
        pipeline.set_plot_request("a*x", [("a", "2")]);
        pump_until(&mut presenter, &mut recorder, |r| r.published.len() == 1);

        pipeline.set_plot_request("a*x +", [("a", "2")]);
        pump_until(&mut presenter, &mut recorder, |r| r.errors.len() == 1);
        wait_for_phase(&pipeline, PipelinePhase::Idle);
        assert!(presenter.geometry().is_some());
        let passes = evaluator.passes.load(Ordering::SeqCst);

        // A rejected request is not recomputed for new viewports.
        pipeline.on_viewport_changed(snapshot(1.0));
        presenter.wait(&mut recorder, Duration::from_millis(150));
        assert_eq!(evaluator.passes.load(Ordering::SeqCst), passes);
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.published.len(), 1);

        pipeline.set_plot_request("a*x + 1", [("a", "2")]);
        pump_until(&mut presenter, &mut recorder, |r| r.published.len() == 2);
    }

    #[test]
    fn structural_error_survives_pan_during_classification() {
        let evaluator = Arc::new(SlowEvaluator {
            classify_delay: Some(Duration::from_millis(100)),
            ..SlowEvaluator::default()
        });
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let mut recorder = Recorder::default();

        pipeline.on_viewport_changed(snapshot(0.0));
        pipeline.set_plot_request("x +", std::iter::empty::<(String, String)>());
        wait_for_phase(&pipeline, PipelinePhase::Computing);
        // Supersedes the job while it is still classifying.
        pipeline.on_viewport_changed(snapshot(1.0));

        pump_until(&mut presenter, &mut recorder, |r| r.errors.len() == 1);
        wait_for_phase(&pipeline, PipelinePhase::Idle);
        pipeline.on_viewport_changed(snapshot(2.0));
        presenter.wait(&mut recorder, Duration::from_millis(300));
        assert_eq!(recorder.errors.len(), 1);
        assert!(recorder.published.is_empty());
    }

    #[test]
    fn viewport_change_cancels_running_computation() {
        let evaluator = Arc::new(SlowEvaluator {
            delay: Some(Duration::from_millis(1)),
            ..SlowEvaluator::default()
        });
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let mut recorder = Recorder::default();

        let wide = ViewportSnapshot::new(-1.0, 1.0, -1.0, 1.0, 4000, 100).expect("valid");
        pipeline.on_viewport_changed(wide);
        pipeline.set_plot_request("x", std::iter::empty::<(String, String)>());
        wait_for_phase(&pipeline, PipelinePhase::Computing);
        let started = Instant::now();
        let latest = pipeline.on_viewport_changed(snapshot(0.0));

        pump_until(&mut presenter, &mut recorder, |r| !r.published.is_empty());
        assert!(started.elapsed() < Duration::from_secs(3));
        wait_for_phase(&pipeline, PipelinePhase::Idle);
        presenter.wait(&mut recorder, Duration::from_millis(150));
        let generations: Vec<Generation> = recorder
            .published
            .iter()
            .map(|(generation, _)| *generation)
            .collect();
        assert_eq!(generations, vec![latest]);
        assert_eq!(evaluator.passes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delivered_generations_increase() {
        let evaluator = Arc::new(SlowEvaluator::default());
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let mut recorder = Recorder::default();

        pipeline.set_plot_request("sin(x)", std::iter::empty::<(String, String)>());
        for step in 0..50 {
            pipeline.on_viewport_changed(snapshot(f64::from(step) * 0.1));
            presenter.dispatch(&mut recorder);
        }
        let last = pipeline.current_generation();
        pump_until(&mut presenter, &mut recorder, |r| {
            r.published.last().is_some_and(|(generation, _)| *generation == last)
        });
        assert!(
            recorder
                .published
                .windows(2)
                .all(|pair| pair[0].0 < pair[1].0)
        );
    }

    #[test]
    fn incomplete_inputs_only_invalidate() {
        let evaluator = Arc::new(SlowEvaluator::default());
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let mut recorder = Recorder::default();

        let first = pipeline.set_plot_request("x", std::iter::empty::<(String, String)>());
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
        assert_eq!(pipeline.current_generation(), first);
        presenter.wait(&mut recorder, Duration::from_millis(100));
        assert_eq!(evaluator.passes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let evaluator = Arc::new(SlowEvaluator::default());
        let (pipeline, mut presenter) = start(&evaluator, Duration::ZERO);
        let other = pipeline.clone();
        pipeline.dispose();
        other.dispose();
        assert!(pipeline.is_disposed());
        assert_eq!(pipeline.phase(), PipelinePhase::Disposed);

        let generation = pipeline.current_generation();
        assert_eq!(pipeline.on_viewport_changed(snapshot(0.0)), generation);
        let mut recorder = Recorder::default();
        assert!(!presenter.wait(&mut recorder, Duration::from_millis(50)));
    }

    #[test]
    fn triggers_racing_dispose_never_mint_afterwards() {
        let evaluator = Arc::new(SlowEvaluator::default());
        let (pipeline, _presenter) = start(&evaluator, Duration::from_millis(50));
        let stop = Arc::new(AtomicBool::new(false));
        let hammers: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        pipeline.on_viewport_changed(snapshot(0.0));
                        pipeline.set_plot_request("x", std::iter::empty::<(String, String)>());
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        pipeline.dispose();
        let after = pipeline.current_generation();
        thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Release);
        for hammer in hammers {
            hammer.join().expect("trigger thread");
        }
        assert_eq!(pipeline.current_generation(), after);
        assert_eq!(pipeline.phase(), PipelinePhase::Disposed);
    }

    #[test]
    fn dispose_stops_slow_pass_promptly() {
        let evaluator = Arc::new(SlowEvaluator {
            delay: Some(Duration::from_millis(1)),
            ..SlowEvaluator::default()
        });
        let (pipeline, _presenter) = start(&evaluator, Duration::ZERO);
        let wide = ViewportSnapshot::new(-1.0, 1.0, -1.0, 1.0, 8000, 100).expect("valid");
        pipeline.on_viewport_changed(wide);
        pipeline.set_plot_request("x", std::iter::empty::<(String, String)>());
        wait_for_phase(&pipeline, PipelinePhase::Computing);

        let started = Instant::now();
        drop(pipeline);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
