//! The shape of a value as it comes back from a store.

use std::{
    ops::Deref,
    time::{Duration, SystemTime},
};

/// A cached value together with its storage metadata.
///
/// A `StoredEntry` is what a [`Store`](crate::Store) hands back on a read:
/// the value itself, the instant it was written, and how much lifetime it had
/// left at the moment of the read. The policy engine derives staleness from
/// these two time fields; the store never decides staleness itself.
///
/// # Examples
///
/// ```
/// use larder_store::StoredEntry;
/// use std::time::{Duration, SystemTime};
///
/// let entry = StoredEntry::new("value", SystemTime::UNIX_EPOCH, Duration::from_secs(60));
/// assert_eq!(*entry.item(), "value");
/// assert_eq!(entry.ttl(), Duration::from_secs(60));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry<V> {
    item: V,
    stored: SystemTime,
    ttl: Duration,
}

impl<V> StoredEntry<V> {
    /// Creates an entry from a value, its write instant, and its remaining
    /// lifetime at read time.
    pub fn new(item: V, stored: SystemTime, ttl: Duration) -> Self {
        Self { item, stored, ttl }
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn item(&self) -> &V {
        &self.item
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_item(self) -> V {
        self.item
    }

    /// Returns the instant the value was written to the store.
    #[must_use]
    pub fn stored(&self) -> SystemTime {
        self.stored
    }

    /// Returns the lifetime the entry had left when it was read.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns how old the entry is at `now`.
    ///
    /// Returns zero if the system clock moved backwards past the write
    /// instant.
    #[must_use]
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.stored).unwrap_or_default()
    }
}

impl<V> Deref for StoredEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.item
    }
}
