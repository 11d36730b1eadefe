//! Debounced scheduling of computations.
//!
//! Every trigger mints a generation synchronously, so a running computation
//! sees itself cancelled before the trigger returns. The start itself is
//! deferred: a timer thread holds the latest job and hands it to the worker
//! once the delay elapses with no newer trigger. Re-arming replaces the
//! pending job and restarts the delay.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::error::PlotError;
use crate::expr::PlotRequest;
use crate::generation::{CancellationToken, Generation, GenerationGuard, GenerationWatch};
use crate::view::ViewportSnapshot;

/// A computation stamped with the generation it belongs to.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub(crate) generation: Generation,
    pub(crate) request_id: u64,
    pub(crate) request: PlotRequest,
    pub(crate) snapshot: ViewportSnapshot,
    pub(crate) token: CancellationToken,
}

#[derive(Debug)]
enum Command {
    Arm { job: Job, delay: Duration },
    Disarm,
    Shutdown,
}

/// Generation owner and debounce timer.
#[derive(Debug)]
pub(crate) struct Scheduler {
    guard: GenerationGuard,
    commands: Sender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start the timer thread. Due jobs are sent to `jobs`.
    pub(crate) fn spawn(jobs: Sender<Job>) -> Result<Self, PlotError> {
        let (commands, inbox) = unbounded();
        let thread = thread::Builder::new()
            .name("liveplot-scheduler".into())
            .spawn(move || run_timer(inbox, jobs))
            .map_err(|source| PlotError::Spawn {
                name: "scheduler",
                source,
            })?;
        Ok(Self {
            guard: GenerationGuard::new(),
            commands,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Mint a generation and arm the timer for it.
    pub(crate) fn schedule(
        &self,
        request_id: u64,
        request: PlotRequest,
        snapshot: ViewportSnapshot,
        delay: Duration,
    ) -> Generation {
        let generation = self.guard.mint_next();
        let job = Job {
            generation,
            request_id,
            request,
            snapshot,
            token: self.guard.token_for(generation),
        };
        if self.commands.send(Command::Arm { job, delay }).is_err() {
            debug!("scheduler stopped; dropping {generation}");
        }
        generation
    }

    /// Mint a generation without scheduling anything, cancelling in-flight
    /// and pending work.
    pub(crate) fn invalidate(&self) -> Generation {
        let generation = self.guard.mint_next();
        // A disconnected timer has nothing left to disarm.
        let _ = self.commands.send(Command::Disarm);
        generation
    }

    pub(crate) fn current(&self) -> Generation {
        self.guard.current()
    }

    pub(crate) fn watch(&self) -> GenerationWatch {
        self.guard.watch()
    }

    /// Cancel everything and stop the timer thread. Idempotent.
    pub(crate) fn shutdown(&self) -> Generation {
        let generation = self.guard.mint_next();
        self.guard.request_stop();
        let _ = self.commands.send(Command::Shutdown);
        let handle = self.thread.lock().take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!("scheduler thread panicked");
        }
        generation
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer(inbox: Receiver<Command>, jobs: Sender<Job>) {
    let mut pending: Option<Job> = None;
    let mut deadline: Option<Instant> = None;
    loop {
        let command = match deadline {
            Some(at) => inbox.recv_deadline(at),
            None => inbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match command {
            Ok(Command::Arm { job, delay }) => {
                if let Some(replaced) = pending.replace(job) {
                    trace!("debounced {}", replaced.generation);
                }
                deadline = Some(Instant::now() + delay);
            }
            Ok(Command::Disarm) => {
                pending = None;
                deadline = None;
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                let Some(job) = pending.take() else {
                    continue;
                };
                if job.token.is_cancelled() {
                    trace!("timer fired for stale {}", job.generation);
                } else if jobs.send(job).is_err() {
                    debug!("worker gone; stopping timer");
                    break;
                }
            }
        }
    }
    trace!("scheduler thread exiting");
}
