//! Generation counter and cooperative cancellation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Version id of one logical recomputation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Generation before any trigger.
    pub const INITIAL: Self = Self(0);

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner of the monotonic generation counter.
///
/// Only the scheduler mints. Other parties receive a [`GenerationWatch`] or a
/// [`CancellationToken`], both read-only.
#[derive(Debug)]
pub(crate) struct GenerationGuard {
    current: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
}

impl GenerationGuard {
    pub(crate) fn new() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(Generation::INITIAL.0)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Increment and return the new current generation.
    pub(crate) fn mint_next(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub(crate) fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    pub(crate) fn token_for(&self, generation: Generation) -> CancellationToken {
        CancellationToken {
            generation,
            current: Arc::clone(&self.current),
            stop: Arc::clone(&self.stop),
        }
    }

    pub(crate) fn watch(&self) -> GenerationWatch {
        GenerationWatch {
            current: Arc::clone(&self.current),
        }
    }

    /// Ask every outstanding token to report cancelled.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Read-only view of the live generation.
#[derive(Debug, Clone)]
pub(crate) struct GenerationWatch {
    current: Arc<AtomicU64>,
}

impl GenerationWatch {
    pub(crate) fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    pub(crate) fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

/// Poll-friendly cancellation predicate bound to one generation.
///
/// A token reports cancelled once a newer generation has been minted or the
/// pipeline is shutting down. Polling costs two atomic loads.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: Generation,
    current: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Token that never cancels, for driving a computation directly.
    pub fn detached() -> Self {
        Self {
            generation: Generation::INITIAL,
            current: Arc::new(AtomicU64::new(Generation::INITIAL.0)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Generation the token belongs to.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Check whether the computation should stop.
    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Acquire)
            || self.current.load(Ordering::Acquire) != self.generation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minting_invalidates_older_tokens() {
        let guard = GenerationGuard::new();
        let first = guard.mint_next();
        let token = guard.token_for(first);
        assert!(!token.is_cancelled());
        assert!(guard.watch().is_current(first));

        let second = guard.mint_next();
        assert!(second > first);
        assert!(token.is_cancelled());
        assert!(!guard.token_for(second).is_cancelled());
        assert!(!guard.watch().is_current(first));
    }

    #[test]
    fn stop_cancels_current_token() {
        let guard = GenerationGuard::new();
        let generation = guard.mint_next();
        let token = guard.token_for(generation);
        guard.request_stop();
        assert!(token.is_cancelled());
    }

    #[test]
    fn detached_token_stays_live() {
        assert!(!CancellationToken::detached().is_cancelled());
    }
}
