//! In-memory storage backend for the `larder` cache policy engine.
//!
//! This crate provides [`MemoryStore`], a process-local implementation of the
//! [`Store`](larder_store::Store) contract. It is the default backend for
//! standalone deployments and the workhorse of the test suites.
//!
//! Entries are stamped with the store's clock on write; reads report the
//! remaining lifetime and lazily evict entries whose lifetime has run out.
//!
//! # Examples
//!
//! ```
//! use larder_memory::MemoryStore;
//! use larder_store::{Store, StoreKey};
//! use std::time::Duration;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let store = MemoryStore::<i32>::new(Clock::new_frozen());
//! let key = StoreKey::new("users", "alice");
//!
//! store.set(&key, 42, Duration::from_secs(60)).await?;
//! let entry = store.get(&key).await?.unwrap();
//! assert_eq!(*entry.item(), 42);
//! # Ok::<(), larder_store::Error>(())
//! # });
//! ```

mod store;

#[doc(inline)]
pub use store::MemoryStore;
