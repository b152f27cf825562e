//! Storage contract for the `larder` cache policy engine.
//!
//! This crate defines the interface between a cache policy and whatever is
//! actually holding the bytes:
//!
//! - [`Store`] - the segment-addressed backend trait (`get`/`set`/`drop_entry`
//!   plus a segment-name probe and a readiness probe)
//! - [`StoreKey`] - the `{segment, id}` address of an entry
//! - [`StoredEntry`] - a value as it comes back from a store, with its write
//!   instant and remaining lifetime
//! - [`Error`] - the shared error type for store operations
//! - [`NoStore`] - the null backend used by policies that run without storage
//!
//! Storage backends implement [`Store`]; the policy engine in `larder` layers
//! expiration, staleness, and request coalescing on top.

pub mod entry;
pub mod error;
pub mod store;

#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use entry::StoredEntry;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use store::{NoStore, Store, StoreKey};
