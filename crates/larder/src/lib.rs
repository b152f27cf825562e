//! Cache policy engine: expiration, staleness, and single-flight
//! regeneration over pluggable storage.
//!
//! A [`Policy`] sits between callers and a [`Store`](larder_store::Store)
//! and enforces the caching rules the caller configured:
//!
//! - **Expiration** - entries live for a relative [`expires_in`] lifetime or
//!   until a daily [`expires_at`] wall-clock time.
//! - **Stale-while-revalidate** - entries past their [`stale_in`] mark keep
//!   serving for up to [`stale_timeout`] while a producer recomputes the
//!   value in the background.
//! - **Single-flight** - concurrent `get`s for one id share a single store
//!   read and a single producer run; every waiter receives the same
//!   completion plus a per-request [`Report`].
//!
//! [`expires_in`]: Rules::expires_in
//! [`expires_at`]: Rules::expires_at
//! [`stale_in`]: Rules::stale_in
//! [`stale_timeout`]: Rules::stale_timeout
//!
//! # Examples
//!
//! ## Read-through caching with a producer
//!
//! ```
//! use larder::{Generated, Policy, Rules};
//! use larder_memory::MemoryStore;
//! use std::time::Duration;
//! use tick::Clock;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Clock::new_tokio();
//! let store = MemoryStore::<String>::new(clock.clone());
//!
//! let policy = Policy::new(
//!     Rules::new()
//!         .expires_in(Duration::from_secs(60))
//!         .stale_in(Duration::from_secs(30))
//!         .stale_timeout(Duration::from_millis(100))
//!         .generate_timeout(Duration::from_secs(2))
//!         .generate(|key| async move {
//!             // An expensive recomputation, e.g. a database query.
//!             Ok(Generated::new(format!("profile of {}", key.id())))
//!         }),
//!     store,
//!     "profiles",
//!     clock,
//! )?;
//!
//! let fetched = policy.get("user:42").await?;
//! assert_eq!(fetched.value.as_deref(), Some("profile of user:42"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Plain expiration, no producer
//!
//! ```
//! use larder::{Policy, Rules};
//! use larder_memory::MemoryStore;
//! use std::time::Duration;
//! use tick::Clock;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Clock::new_tokio();
//! let store = MemoryStore::<u64>::new(clock.clone());
//! let policy = Policy::new(
//!     Rules::new().expires_in(Duration::from_secs(5)),
//!     store,
//!     "counters",
//!     clock,
//! )?;
//!
//! policy.set("total", 10, None).await?;
//! let fetched = policy.get("total").await?;
//! assert_eq!(fetched.value, Some(10));
//! # Ok(())
//! # }
//! ```

pub mod key;
pub mod policy;
pub mod report;
pub mod rule;
pub mod stats;

mod flight;
mod pending;
mod runtime;
mod telemetry;
mod ttl;

#[doc(inline)]
pub use key::Key;
#[doc(inline)]
pub use policy::{Policy, PolicyError};
#[doc(inline)]
pub use report::{FetchError, Fetched, Report};
#[doc(inline)]
pub use rule::{GenerateTimeout, Generated, RuleError, Rules, StaleIn};
#[doc(inline)]
pub use stats::StatsSnapshot;

#[doc(inline)]
pub use larder_store::{Error, NoStore, Store, StoreKey, StoredEntry};
