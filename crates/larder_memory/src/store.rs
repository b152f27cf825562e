//! A process-local segment-addressed store.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;
use tick::Clock;

use larder_store::{Error, Result, Store, StoreKey, StoredEntry};

/// A slot as written: the value, its write instant, and its absolute expiry.
#[derive(Clone, Debug)]
struct Slot<V> {
    item: V,
    stored: SystemTime,
    expires: SystemTime,
}

/// An in-memory store.
///
/// Entries live in a per-segment map guarded by a mutex that is never held
/// across an await. Expiration is lazy: an expired entry is removed on the
/// read that discovers it. Lifetimes are absolute against the store's clock,
/// so reads report the remaining lifetime the policy layer expects.
///
/// The store is cheaply cloneable; clones share the same underlying map, the
/// way one backend is shared by many policies.
#[derive(Debug)]
pub struct MemoryStore<V> {
    segments: Arc<Mutex<HashMap<String, HashMap<String, Slot<V>>>>>,
    clock: Clock,
}

impl<V> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            segments: Arc::clone(&self.segments),
            clock: self.clock.clone(),
        }
    }
}

impl<V> MemoryStore<V> {
    /// Creates a new empty store over the given clock.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            segments: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Returns the number of live entries across all segments.
    ///
    /// Counts entries as written; lazily-expired entries that have not been
    /// read yet are included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.lock().values().map(HashMap::len).sum()
    }

    /// Returns true when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Store<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &StoreKey) -> Result<Option<StoredEntry<V>>> {
        let now = self.clock.system_time();
        let mut segments = self.segments.lock();

        let Some(segment) = segments.get_mut(&key.segment) else {
            return Ok(None);
        };
        let Some(slot) = segment.get(&key.id) else {
            return Ok(None);
        };

        let Ok(remaining) = slot.expires.duration_since(now) else {
            segment.remove(&key.id);
            return Ok(None);
        };
        if remaining.is_zero() {
            segment.remove(&key.id);
            return Ok(None);
        }

        Ok(Some(StoredEntry::new(slot.item.clone(), slot.stored, remaining)))
    }

    async fn set(&self, key: &StoreKey, value: V, ttl: Duration) -> Result<()> {
        let now = self.clock.system_time();
        let slot = Slot {
            item: value,
            stored: now,
            expires: now + ttl,
        };

        self.segments
            .lock()
            .entry(key.segment.clone())
            .or_default()
            .insert(key.id.clone(), slot);
        Ok(())
    }

    async fn drop_entry(&self, key: &StoreKey) -> Result<()> {
        if let Some(segment) = self.segments.lock().get_mut(&key.segment) {
            segment.remove(&key.id);
        }
        Ok(())
    }

    fn validate_segment_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::from_message("empty segment name"));
        }
        if name.contains('\0') {
            return Err(Error::from_message("segment name contains a NUL character"));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tick::ClockControl;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn round_trips_a_value() {
        block_on(async {
            let store = MemoryStore::new(Clock::new_frozen());
            let key = StoreKey::new("seg", "a");

            store.set(&key, "v", Duration::from_secs(10)).await.unwrap();
            let entry = store.get(&key).await.unwrap().unwrap();
            assert_eq!(*entry.item(), "v");
            assert_eq!(entry.ttl(), Duration::from_secs(10));
        });
    }

    #[test]
    fn reports_remaining_lifetime() {
        block_on(async {
            let control = ClockControl::new();
            let store = MemoryStore::new(control.to_clock());
            let key = StoreKey::new("seg", "a");

            store.set(&key, 1, Duration::from_secs(10)).await.unwrap();
            control.advance(Duration::from_secs(4));

            let entry = store.get(&key).await.unwrap().unwrap();
            assert_eq!(entry.ttl(), Duration::from_secs(6));
        });
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        block_on(async {
            let control = ClockControl::new();
            let store = MemoryStore::new(control.to_clock());
            let key = StoreKey::new("seg", "a");

            store.set(&key, 1, Duration::from_secs(1)).await.unwrap();
            control.advance(Duration::from_secs(2));

            assert!(store.get(&key).await.unwrap().is_none());
            assert!(store.is_empty());
        });
    }

    #[test]
    fn zero_lifetime_expires_immediately() {
        block_on(async {
            let store = MemoryStore::new(Clock::new_frozen());
            let key = StoreKey::new("seg", "a");

            store.set(&key, 1, Duration::ZERO).await.unwrap();
            assert!(store.get(&key).await.unwrap().is_none());
        });
    }

    #[test]
    fn segments_are_isolated() {
        block_on(async {
            let store = MemoryStore::new(Clock::new_frozen());

            store.set(&StoreKey::new("a", "id"), 1, Duration::from_secs(10)).await.unwrap();
            store.set(&StoreKey::new("b", "id"), 2, Duration::from_secs(10)).await.unwrap();

            let a = store.get(&StoreKey::new("a", "id")).await.unwrap().unwrap();
            let b = store.get(&StoreKey::new("b", "id")).await.unwrap().unwrap();
            assert_eq!(*a.item(), 1);
            assert_eq!(*b.item(), 2);

            store.drop_entry(&StoreKey::new("a", "id")).await.unwrap();
            assert!(store.get(&StoreKey::new("a", "id")).await.unwrap().is_none());
            assert!(store.get(&StoreKey::new("b", "id")).await.unwrap().is_some());
        });
    }

    #[test]
    fn dropping_absent_ids_is_fine() {
        block_on(async {
            let store = MemoryStore::<i32>::new(Clock::new_frozen());
            store.drop_entry(&StoreKey::new("seg", "missing")).await.unwrap();
        });
    }

    #[test]
    fn clones_share_storage() {
        block_on(async {
            let store = MemoryStore::new(Clock::new_frozen());
            let other = store.clone();
            let key = StoreKey::new("seg", "a");

            store.set(&key, 9, Duration::from_secs(10)).await.unwrap();
            assert_eq!(*other.get(&key).await.unwrap().unwrap().item(), 9);
        });
    }

    #[test]
    fn segment_name_rules() {
        let store = MemoryStore::<i32>::new(Clock::new_frozen());
        assert!(store.validate_segment_name("users").is_ok());
        assert!(store.validate_segment_name("").is_err());
        assert!(store.validate_segment_name("a\0b").is_err());
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(MemoryStore<String>: Send, Sync);
    }
}
