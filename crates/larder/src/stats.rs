//! Operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one policy.
///
/// `hits` counts every waiter of a coalesced read that observed a stored
/// entry, so a single store round-trip serving ten callers counts ten hits.
/// `generates` counts producer invocations (including ones that later time
/// out), and `errors` counts store and producer failures.
#[derive(Debug, Default)]
pub struct Stats {
    gets: AtomicU64,
    sets: AtomicU64,
    hits: AtomicU64,
    stales: AtomicU64,
    generates: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr_gets(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_sets(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_hits(&self, count: u64) {
        self.hits.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn incr_stales(&self) {
        self.stales.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_generates(&self) {
        self.generates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time view of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            stales: self.stales.load(Ordering::Relaxed),
            generates: self.generates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of a policy's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// `get` calls.
    pub gets: u64,
    /// `set` calls, including the engine's own write-backs.
    pub sets: u64,
    /// Waiters that were answered from a stored entry.
    pub hits: u64,
    /// Reads that observed a stale entry.
    pub stales: u64,
    /// Producer invocations.
    pub generates: u64,
    /// Store and producer failures.
    pub errors: u64,
}
