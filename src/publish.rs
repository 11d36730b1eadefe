//! Delivery of finished geometry to the presentation thread.
//!
//! The worker side ([`Publisher`]) drops results whose generation is no
//! longer current and parks the rest in a single-slot mailbox. A pending
//! flag keeps at most one wake-up queued on the bounded channel, so a burst
//! of publishes costs the presentation thread one redraw. The presentation
//! side ([`Presenter`]) re-checks the generation before calling the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::generation::{Generation, GenerationWatch};
use crate::geom::PlotGeometry;

/// Consumer of pipeline output, driven on the presentation thread.
pub trait GeometrySink {
    /// New geometry for `generation`.
    ///
    /// Called at most once per generation, in increasing generation order.
    fn on_geometry_published(&mut self, generation: Generation, geometry: &PlotGeometry);

    /// The current expression does not parse. Previously published geometry
    /// stays valid.
    fn on_structural_error(&mut self, message: &str);

    /// Published geometry was cleared.
    fn on_cleared(&mut self) {}
}

/// Lifecycle of a pipeline instance.
///
/// Publishing and cancellation are instantaneous on the worker, so a job
/// that publishes, is cancelled or fails to parse returns straight to
/// [`Idle`](Self::Idle). Those outcomes are logged rather than held as
/// phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing pending or running.
    Idle,
    /// A computation start is armed on the debounce timer.
    Scheduled,
    /// The worker is computing the current generation.
    Computing,
    /// Background resources are gone. Terminal.
    Disposed,
}

/// Phase bookkeeping shared by triggers and the worker.
///
/// Worker transitions only apply while their generation is still current,
/// so a finishing stale job cannot overwrite a fresher `Scheduled`.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    phase: Mutex<PipelinePhase>,
    watch: GenerationWatch,
}

impl PhaseTracker {
    pub(crate) fn new(watch: GenerationWatch) -> Self {
        Self {
            phase: Mutex::new(PipelinePhase::Idle),
            watch,
        }
    }

    pub(crate) fn get(&self) -> PipelinePhase {
        *self.phase.lock()
    }

    /// Mint under the phase lock, then enter `next`.
    ///
    /// Holding the lock across the mint keeps a worker transition for the
    /// new generation from landing before `next`.
    pub(crate) fn trigger(
        &self,
        next: PipelinePhase,
        mint: impl FnOnce() -> Generation,
    ) -> Generation {
        let mut phase = self.phase.lock();
        let generation = mint();
        if *phase != PipelinePhase::Disposed {
            trace!("phase {:?} -> {next:?} ({generation})", *phase);
            *phase = next;
        }
        generation
    }

    /// Unconditional transition; `Disposed` is sticky.
    pub(crate) fn set(&self, next: PipelinePhase) {
        let mut phase = self.phase.lock();
        if *phase != PipelinePhase::Disposed {
            trace!("phase {:?} -> {next:?}", *phase);
            *phase = next;
        }
    }

    /// Worker transition, applied only if `generation` is current.
    pub(crate) fn set_for(&self, generation: Generation, next: PipelinePhase) {
        let mut phase = self.phase.lock();
        if *phase != PipelinePhase::Disposed && self.watch.is_current(generation) {
            trace!("phase {:?} -> {next:?} ({generation})", *phase);
            *phase = next;
        }
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    cleared: bool,
    error: Option<(Generation, String)>,
    geometry: Option<(Generation, Arc<PlotGeometry>)>,
}

/// Worker-side handle of the presentation channel.
#[derive(Debug, Clone)]
pub(crate) struct Publisher {
    watch: GenerationWatch,
    mailbox: Arc<Mutex<Mailbox>>,
    pending: Arc<AtomicBool>,
    wake: Sender<()>,
}

/// Create a connected publisher and presenter.
pub(crate) fn channel(watch: GenerationWatch) -> (Publisher, Presenter) {
    let (wake_tx, wake_rx) = bounded(1);
    let mailbox = Arc::new(Mutex::new(Mailbox::default()));
    let pending = Arc::new(AtomicBool::new(false));
    let publisher = Publisher {
        watch: watch.clone(),
        mailbox: Arc::clone(&mailbox),
        pending: Arc::clone(&pending),
        wake: wake_tx,
    };
    let presenter = Presenter {
        watch,
        mailbox,
        pending,
        wake: wake_rx,
        last_generation: None,
        latest: None,
    };
    (publisher, presenter)
}

impl Publisher {
    /// Hand finished geometry to the presentation thread.
    ///
    /// Returns `false` without side effects when `generation` is stale.
    pub(crate) fn publish(&self, generation: Generation, geometry: PlotGeometry) -> bool {
        if !self.watch.is_current(generation) {
            trace!("dropping stale geometry for {generation}");
            return false;
        }
        self.mailbox.lock().geometry = Some((generation, Arc::new(geometry)));
        self.notify();
        true
    }

    /// Report a structural error raised while computing `generation`.
    pub(crate) fn structural_error(&self, generation: Generation, message: String) -> bool {
        if !self.watch.is_current(generation) {
            trace!("dropping stale error for {generation}");
            return false;
        }
        self.mailbox.lock().error = Some((generation, message));
        self.notify();
        true
    }

    /// Drop anything undelivered and tell the presentation thread to clear.
    pub(crate) fn clear(&self) {
        {
            let mut mailbox = self.mailbox.lock();
            mailbox.cleared = true;
            mailbox.error = None;
            mailbox.geometry = None;
        }
        self.notify();
    }

    fn notify(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            trace!("redraw already pending");
            return;
        }
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("presentation channel closed; dropping redraw");
            }
        }
    }
}

/// Presentation-thread end of the pipeline.
///
/// Call [`dispatch`](Self::dispatch) once per frame, or block in
/// [`wait`](Self::wait). [`receiver`](Self::receiver) exposes the wake-up
/// channel for integration into an existing event loop.
#[derive(Debug)]
pub struct Presenter {
    watch: GenerationWatch,
    mailbox: Arc<Mutex<Mailbox>>,
    pending: Arc<AtomicBool>,
    wake: Receiver<()>,
    last_generation: Option<Generation>,
    latest: Option<(Generation, Arc<PlotGeometry>)>,
}

impl Presenter {
    /// Deliver pending output without blocking. Returns whether the sink was
    /// called.
    pub fn dispatch(&mut self, sink: &mut impl GeometrySink) -> bool {
        if self.wake.try_recv().is_err() {
            return false;
        }
        self.deliver(sink)
    }

    /// Block up to `timeout` for output and deliver it. Returns whether the
    /// sink was called.
    pub fn wait(&mut self, sink: &mut impl GeometrySink, timeout: Duration) -> bool {
        match self.wake.recv_timeout(timeout) {
            Ok(()) => self.deliver(sink),
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // Publishers are gone; flush whatever is left.
                self.deliver(sink)
            }
        }
    }

    /// Wake-up channel; one message per coalesced redraw.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.wake
    }

    /// Most recently delivered geometry.
    pub fn geometry(&self) -> Option<&PlotGeometry> {
        self.latest.as_ref().map(|(_, geometry)| geometry.as_ref())
    }

    /// Generation of the most recently delivered geometry.
    pub fn generation(&self) -> Option<Generation> {
        self.latest.as_ref().map(|(generation, _)| *generation)
    }

    fn deliver(&mut self, sink: &mut impl GeometrySink) -> bool {
        self.pending.store(false, Ordering::Release);
        let mailbox = std::mem::take(&mut *self.mailbox.lock());
        let mut delivered = false;

        if mailbox.cleared {
            self.latest = None;
            sink.on_cleared();
            delivered = true;
        }

        let newer_geometry = mailbox.geometry.as_ref().map(|(generation, _)| *generation);
        if let Some((generation, message)) = mailbox.error
            && newer_geometry.is_none_or(|newer| newer < generation)
        {
            sink.on_structural_error(&message);
            delivered = true;
        }

        if let Some((generation, geometry)) = mailbox.geometry {
            let fresh = self.watch.is_current(generation)
                && self.last_generation.is_none_or(|last| generation > last);
            if fresh {
                sink.on_geometry_published(generation, &geometry);
                self.last_generation = Some(generation);
                self.latest = Some((generation, geometry));
                delivered = true;
            } else {
                trace!("presenter skipped stale geometry for {generation}");
            }
        }
        delivered
    }
}
