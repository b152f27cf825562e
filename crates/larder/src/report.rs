//! Per-request completion types.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use larder_store::{Error, StoredEntry};

/// Diagnostics delivered with every `get` completion.
///
/// The report describes the store read that backed the completion: how long
/// it took, whether it errored, and - when an entry was observed - the
/// entry's write instant, remaining lifetime, and staleness. A completion
/// that masked a read error behind regeneration still carries that error
/// here.
#[derive(Clone, Debug, Default)]
pub struct Report {
    /// Wall-clock duration of the store read.
    pub elapsed: Duration,
    /// The store read error, if any (including masked ones).
    pub error: Option<Error>,
    /// Write instant of the observed entry.
    pub stored: Option<SystemTime>,
    /// Remaining lifetime of the observed entry at read time.
    pub ttl: Option<Duration>,
    /// Whether the observed entry was stale.
    pub is_stale: Option<bool>,
}

/// A successful `get` completion.
///
/// `value` is `None` on a clean miss without a producer. `entry` is present
/// when the value was served from the store (fresh or stale); a freshly
/// generated value has no entry.
#[derive(Clone, Debug)]
pub struct Fetched<V> {
    /// The value, if one was served or generated.
    pub value: Option<V>,
    /// Store metadata, when the value came from the store.
    pub entry: Option<StoredEntry<V>>,
    /// Diagnostics for this request.
    pub report: Report,
}

/// A failed `get` completion.
///
/// When the rule keeps stale entries on producer errors
/// (`drop_on_error(false)`), the stale value is still served here alongside
/// the error.
#[derive(Clone, Debug)]
pub struct FetchError<V> {
    /// What went wrong.
    pub error: Error,
    /// The stale value still being served, if the rule allows it.
    pub value: Option<V>,
    /// Store metadata for the stale value.
    pub entry: Option<StoredEntry<V>>,
    /// Diagnostics for this request.
    pub report: Report,
}

impl<V> fmt::Display for FetchError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache policy get failed: {}", self.error)
    }
}

impl<V: fmt::Debug> std::error::Error for FetchError<V> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// The one outcome broadcast to every waiter of a coalesced `get`.
pub(crate) type FetchOutcome<V> = Result<Fetched<V>, FetchError<V>>;
