//! Mock store implementation for testing.
//!
//! This module provides [`MockStore`], a configurable in-memory store that
//! records all operations, supports failure injection for error paths, and
//! can hold operations open so tests can observe in-flight coalescing.

use std::{collections::HashMap, sync::Arc, time::Duration};

use event_listener::Event;
use parking_lot::Mutex;

use crate::{Error, Result, Store, StoreKey, StoredEntry};

/// Recorded store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp<V> {
    /// A get was performed for the given key.
    Get(StoreKey),
    /// A set was performed with the given key, value, and lifetime.
    Set {
        /// The key that was written.
        key: StoreKey,
        /// The value that was written.
        value: V,
        /// The lifetime the value was written with.
        ttl: Duration,
    },
    /// A drop was performed for the given key.
    Drop(StoreKey),
}

type FailPredicate<V> = Box<dyn Fn(&StoreOp<V>) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// Stores values in memory, records every operation for later verification,
/// and can be configured to fail operations on demand. Entries are returned
/// exactly as seeded - the mock performs no expiration of its own, so tests
/// control the `stored`/`ttl` metadata the policy sees.
///
/// # Examples
///
/// ```
/// use larder_store::{testing::{MockStore, StoreOp}, Store, StoreKey, StoredEntry};
/// use std::time::{Duration, SystemTime};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::<i32>::new();
/// let key = StoreKey::new("seg", "a");
///
/// store.set(&key, 42, Duration::from_secs(1)).await.unwrap();
/// let entry = store.get(&key).await.unwrap().unwrap();
/// assert_eq!(*entry.item(), 42);
///
/// assert!(matches!(store.operations()[0], StoreOp::Set { .. }));
/// assert!(matches!(store.operations()[1], StoreOp::Get(_)));
/// # });
/// ```
///
/// # Failure Injection
///
/// ```
/// use larder_store::{testing::{MockStore, StoreOp}, Store, StoreKey};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::<i32>::new();
/// store.fail_when(|op| matches!(op, StoreOp::Get(k) if k.id == "forbidden"));
///
/// assert!(store.get(&StoreKey::new("seg", "forbidden")).await.is_err());
/// assert!(store.get(&StoreKey::new("seg", "allowed")).await.is_ok());
/// # });
/// ```
pub struct MockStore<V> {
    data: Arc<Mutex<HashMap<StoreKey, StoredEntry<V>>>>,
    operations: Arc<Mutex<Vec<StoreOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
    held: Arc<Mutex<bool>>,
    released: Arc<Event>,
    ready: Arc<Mutex<bool>>,
}

impl<V> std::fmt::Debug for MockStore<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("held", &*self.held.lock())
            .finish_non_exhaustive()
    }
}

impl<V> Clone for MockStore<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            held: Arc::clone(&self.held),
            released: Arc::clone(&self.released),
            ready: Arc::clone(&self.ready),
        }
    }
}

impl<V> Default for MockStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockStore<V> {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            held: Arc::new(Mutex::new(false)),
            released: Arc::new(Event::new()),
            ready: Arc::new(Mutex::new(true)),
        }
    }

    /// Seeds an entry with explicit metadata.
    ///
    /// The entry is returned verbatim on the next get, so tests can present
    /// the policy with any `stored`/`ttl` combination.
    pub fn seed(&self, key: StoreKey, entry: StoredEntry<V>) {
        self.data.lock().insert(key, entry);
    }

    /// Holds all subsequent operations open until [`release`](Self::release)
    /// is called.
    ///
    /// Use this to keep a read in flight while further callers pile up, so a
    /// test can observe request coalescing.
    pub fn hold(&self) {
        *self.held.lock() = true;
    }

    /// Releases operations held open by [`hold`](Self::hold).
    pub fn release(&self) {
        *self.held.lock() = false;
        self.released.notify(usize::MAX);
    }

    /// Sets the value the readiness probe reports.
    pub fn set_ready(&self, ready: bool) {
        *self.ready.lock() = ready;
    }

    async fn wait_released(&self) {
        loop {
            if !*self.held.lock() {
                return;
            }
            let listener = self.released.listen();
            if !*self.held.lock() {
                return;
            }
            listener.await;
        }
    }
}

impl<V> MockStore<V>
where
    V: Clone,
{
    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should
    /// fail. Failed operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp<V>> {
        self.operations.lock().clone()
    }

    /// Returns how many get operations have been recorded.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, StoreOp::Get(_)))
            .count()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns true if the store currently holds the given key.
    #[must_use]
    pub fn contains_key(&self, key: &StoreKey) -> bool {
        self.data.lock().contains_key(key)
    }

    fn record(&self, op: StoreOp<V>) {
        self.operations.lock().push(op);
    }

    fn should_fail(&self, op: &StoreOp<V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }
}

impl<V> Store<V> for MockStore<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &StoreKey) -> Result<Option<StoredEntry<V>>> {
        let op = StoreOp::Get(key.clone());
        self.record(op.clone());
        self.wait_released().await;
        if self.should_fail(&op) {
            return Err(Error::caused_by("mock: get failed"));
        }
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &StoreKey, value: V, ttl: Duration) -> Result<()> {
        let op = StoreOp::Set {
            key: key.clone(),
            value: value.clone(),
            ttl,
        };
        self.record(op.clone());
        self.wait_released().await;
        if self.should_fail(&op) {
            return Err(Error::caused_by("mock: set failed"));
        }
        // The mock has no clock; the write instant is the UNIX epoch unless a
        // test re-seeds the entry with explicit metadata.
        self.data
            .lock()
            .insert(key.clone(), StoredEntry::new(value, std::time::SystemTime::UNIX_EPOCH, ttl));
        Ok(())
    }

    async fn drop_entry(&self, key: &StoreKey) -> Result<()> {
        let op = StoreOp::Drop(key.clone());
        self.record(op.clone());
        self.wait_released().await;
        if self.should_fail(&op) {
            return Err(Error::caused_by("mock: drop failed"));
        }
        self.data.lock().remove(key);
        Ok(())
    }

    fn validate_segment_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::from_message("empty segment name"));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        *self.ready.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn records_operations_in_order() {
        block_on(async {
            let store = MockStore::<i32>::new();
            let key = StoreKey::new("seg", "a");

            store.set(&key, 1, Duration::from_secs(1)).await.unwrap();
            let _ = store.get(&key).await.unwrap();
            store.drop_entry(&key).await.unwrap();

            let ops = store.operations();
            assert_eq!(ops.len(), 3);
            assert!(matches!(ops[0], StoreOp::Set { .. }));
            assert!(matches!(ops[1], StoreOp::Get(_)));
            assert!(matches!(ops[2], StoreOp::Drop(_)));
        });
    }

    #[test]
    fn seeded_entries_come_back_verbatim() {
        block_on(async {
            let store = MockStore::<&str>::new();
            let key = StoreKey::new("seg", "a");
            let stored = SystemTime::UNIX_EPOCH + Duration::from_secs(5);

            store.seed(key.clone(), StoredEntry::new("v", stored, Duration::from_millis(400)));

            let entry = store.get(&key).await.unwrap().unwrap();
            assert_eq!(*entry.item(), "v");
            assert_eq!(entry.stored(), stored);
            assert_eq!(entry.ttl(), Duration::from_millis(400));
        });
    }

    #[test]
    fn fail_when_rejects_matching_ops() {
        block_on(async {
            let store = MockStore::<i32>::new();
            store.fail_when(|op| matches!(op, StoreOp::Drop(_)));

            let key = StoreKey::new("seg", "a");
            assert!(store.get(&key).await.is_ok());
            assert!(store.drop_entry(&key).await.is_err());

            store.clear_failures();
            assert!(store.drop_entry(&key).await.is_ok());
        });
    }

    #[test]
    fn drop_removes_entry() {
        block_on(async {
            let store = MockStore::<i32>::new();
            let key = StoreKey::new("seg", "a");

            store.set(&key, 1, Duration::from_secs(1)).await.unwrap();
            assert!(store.contains_key(&key));

            store.drop_entry(&key).await.unwrap();
            assert!(!store.contains_key(&key));
        });
    }

    #[test]
    fn readiness_is_configurable() {
        let store = MockStore::<i32>::new();
        assert!(store.is_ready());
        store.set_ready(false);
        assert!(!store.is_ready());
    }

    #[test]
    fn empty_segment_name_is_rejected() {
        let store = MockStore::<i32>::new();
        assert!(store.validate_segment_name("").is_err());
        assert!(store.validate_segment_name("users").is_ok());
    }
}
