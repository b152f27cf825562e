//! The core trait for storage backends.
//!
//! [`Store`] defines the interface all backends must implement. A store is
//! shared between policies: each policy addresses it through a segment name,
//! and ids are unique within a segment. The policy engine assumes the store
//! serializes its own per-key operations; no transactional semantics are
//! required.

use std::time::Duration;

use crate::{Result, StoredEntry};

/// The `{segment, id}` address of an entry within a store.
///
/// The segment namespaces ids so that independent policies can share one
/// backend without colliding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// The namespace the id lives in.
    pub segment: String,
    /// The entry id, unique within the segment.
    pub id: String,
}

impl StoreKey {
    /// Creates a store key from a segment and an id.
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            id: id.into(),
        }
    }
}

/// Trait for storage backends.
///
/// Implement this trait to plug a backend (in-process map, Redis, memcached,
/// ...) under a cache policy. Only the three data operations are async; the
/// two probes are cheap and synchronous.
///
/// Reads return the remaining lifetime of the entry alongside the value; the
/// policy derives staleness and expiration decisions from it.
pub trait Store<V>: Send + Sync {
    /// Gets an entry, or `None` when the id is absent or expired.
    fn get(&self, key: &StoreKey) -> impl Future<Output = Result<Option<StoredEntry<V>>>> + Send
    where
        V: Send;

    /// Writes a value with the given lifetime.
    fn set(&self, key: &StoreKey, value: V, ttl: Duration) -> impl Future<Output = Result<()>> + Send
    where
        V: Send;

    /// Removes an entry. Removing an absent id is not an error.
    fn drop_entry(&self, key: &StoreKey) -> impl Future<Output = Result<()>> + Send;

    /// Checks that a segment name is acceptable to this backend.
    ///
    /// Called once when a policy is constructed over this store.
    fn validate_segment_name(&self, name: &str) -> Result<()>;

    /// Returns true when the backend can currently serve requests.
    fn is_ready(&self) -> bool;
}

/// The null backend.
///
/// A policy constructed without storage still supports the full `get`/`set`/
/// `drop` surface: reads miss, writes succeed without storing anything, and
/// readiness is always false. This is the client-side mode of operation where
/// the policy only computes TTLs and coalesces generation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStore;

impl<V> Store<V> for NoStore
where
    V: Send + Sync,
{
    async fn get(&self, _key: &StoreKey) -> Result<Option<StoredEntry<V>>> {
        Ok(None)
    }

    async fn set(&self, _key: &StoreKey, _value: V, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn drop_entry(&self, _key: &StoreKey) -> Result<()> {
        Ok(())
    }

    fn validate_segment_name(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        false
    }
}
