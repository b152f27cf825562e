//! The pending-generate window.
//!
//! When a rule sets `pending_generate_timeout`, a producer run marks its id
//! here and a repeat run for the same id is suppressed until the mark is
//! cleared - either by the producer finishing or by the window elapsing.

use std::collections::HashSet;

use parking_lot::Mutex;

pub(crate) struct PendingGenerates {
    marks: Mutex<HashSet<String>>,
}

impl PendingGenerates {
    pub(crate) fn new() -> Self {
        Self {
            marks: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true if the id was successfully marked (no run is pending).
    pub(crate) fn try_begin(&self, id: &str) -> bool {
        self.marks.lock().insert(id.to_owned())
    }

    /// Clears the mark. Clearing an absent mark is fine; the window timer
    /// and the producer both call this.
    pub(crate) fn end(&self, id: &str) {
        self.marks.lock().remove(id);
    }
}
