//! The background computation thread.
//!
//! Runs one job at a time. Before starting, the queue is drained to its most
//! recent job so a backlog of superseded work is never computed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;
use log::{debug, trace, warn};

use crate::compute::{ComputeError, compute_geometry};
use crate::config::PipelineConfig;
use crate::error::PlotError;
use crate::expr::ArithmeticEvaluator;
use crate::publish::{PhaseTracker, PipelinePhase, Publisher};
use crate::schedule::Job;

/// Everything the worker thread owns.
pub(crate) struct Worker {
    pub(crate) jobs: Receiver<Job>,
    pub(crate) evaluator: Arc<dyn ArithmeticEvaluator>,
    pub(crate) publisher: Publisher,
    pub(crate) phase: Arc<PhaseTracker>,
    /// Id of the last request whose parse failure was reported, `0` for
    /// none.
    pub(crate) rejected: Arc<AtomicU64>,
    pub(crate) config: PipelineConfig,
}

impl Worker {
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>, PlotError> {
        thread::Builder::new()
            .name("liveplot-worker".into())
            .spawn(move || self.run())
            .map_err(|source| PlotError::Spawn {
                name: "worker",
                source,
            })
    }

    fn run(self) {
        let mut last_reported = 0;
        while let Ok(job) = self.jobs.recv() {
            let job = self.jobs.try_iter().last().unwrap_or(job);
            if job.token.is_cancelled() {
                trace!("skipping stale {}", job.generation);
                continue;
            }
            self.phase.set_for(job.generation, PipelinePhase::Computing);
            let started = Instant::now();
            let result = compute_geometry(
                self.evaluator.as_ref(),
                &job.request,
                &job.snapshot,
                &job.token,
                &self.config,
            );
            match result {
                Ok(geometry) => {
                    let points = geometry.polyline().len();
                    let segments = geometry.segments().len();
                    let published = self.publisher.publish(job.generation, geometry);
                    debug!(
                        "computed {} in {:?}: {points} points, {segments} segments, published={published}",
                        job.generation,
                        started.elapsed()
                    );
                }
                Err(ComputeError::Cancelled) => {
                    trace!("{} cancelled after {:?}", job.generation, started.elapsed());
                }
                Err(ComputeError::Structural(error)) => {
                    // A stale report is dropped; until one lands, triggers
                    // keep scheduling the request so the next job retries.
                    if last_reported != job.request_id
                        && self
                            .publisher
                            .structural_error(job.generation, error.to_string())
                    {
                        last_reported = job.request_id;
                        self.rejected.store(job.request_id, Ordering::Release);
                        warn!("rejected {:?}: {error}", job.request.expression());
                    }
                }
            }
            self.phase.set_for(job.generation, PipelinePhase::Idle);
        }
        trace!("worker thread exiting");
    }
}
