//! Per-id coalescing of in-flight requests.
//!
//! The first caller for an id becomes the leader and drives the store read
//! and (possibly) regeneration; every later caller for the same id attaches
//! to the same [`Flight`] and receives a clone of the one outcome. The
//! outcome slot is write-once, which is what makes resolution idempotent
//! under races between fallback timers and producer completion - whichever
//! resolver arrives first wins, the rest are silently dropped.

use std::{
    collections::HashMap,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use event_listener::Event;
use parking_lot::Mutex;

/// A single coalesced request: one outcome, many waiters.
pub(crate) struct Flight<O> {
    outcome: OnceLock<O>,
    ready: Event,
    waiters: AtomicUsize,
}

impl<O: Clone> Flight<O> {
    fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            ready: Event::new(),
            // The leader is a waiter too.
            waiters: AtomicUsize::new(1),
        }
    }

    /// Stores the outcome if none has been stored yet and wakes every waiter.
    ///
    /// Returns true only for the resolver that won.
    pub(crate) fn resolve(&self, outcome: O) -> bool {
        let won = self.outcome.set(outcome).is_ok();
        if won {
            self.ready.notify(usize::MAX);
        }
        won
    }

    /// Number of callers attached to this flight.
    pub(crate) fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Waits for the outcome.
    pub(crate) async fn wait(&self) -> O {
        loop {
            if let Some(outcome) = self.outcome.get() {
                return outcome.clone();
            }

            // Register before the re-check so a resolution between the two
            // reads cannot be missed.
            let listener = self.ready.listen();

            if let Some(outcome) = self.outcome.get() {
                return outcome.clone();
            }

            listener.await;
        }
    }
}

/// The table of in-flight requests, keyed by id.
pub(crate) struct FlightBoard<O> {
    table: Mutex<HashMap<String, Arc<Flight<O>>>>,
}

impl<O: Clone> FlightBoard<O> {
    pub(crate) fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches to the flight for `id`, creating it if absent.
    ///
    /// Returns the flight and whether the caller is its leader.
    pub(crate) fn join(&self, id: &str) -> (Arc<Flight<O>>, bool) {
        let mut table = self.table.lock();
        if let Some(flight) = table.get(id) {
            flight.waiters.fetch_add(1, Ordering::AcqRel);
            (Arc::clone(flight), false)
        } else {
            let flight = Arc::new(Flight::new());
            table.insert(id.to_owned(), Arc::clone(&flight));
            (flight, true)
        }
    }

    /// Returns the current flight for `id`, if one is in progress.
    pub(crate) fn current(&self, id: &str) -> Option<Arc<Flight<O>>> {
        self.table.lock().get(id).cloned()
    }

    /// Removes the mapping for `id` if it still points at `flight`.
    ///
    /// Called just before resolution so the next `get` for the id starts a
    /// fresh flight instead of attaching to a finished one.
    pub(crate) fn retire(&self, id: &str, flight: &Arc<Flight<O>>) {
        let mut table = self.table.lock();
        if table.get(id).is_some_and(|current| Arc::ptr_eq(current, flight)) {
            table.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table.lock().len()
    }
}
