//! Error types for store operations.

use std::error::Error as StdError;

use ohno::OhnoCore;

/// An error from a store operation.
///
/// Wraps any underlying error from a storage backend while preserving the
/// ability to extract the original typed error. The type is `Clone` because
/// the policy engine broadcasts one completion to every coalesced waiter.
///
/// # For `Store` Implementers
///
/// Wrap your storage-specific errors using [`from_source`](Self::from_source):
///
/// ```ignore
/// impl Store<V> for RedisStore {
///     async fn get(&self, key: &StoreKey) -> Result<Option<StoredEntry<V>>> {
///         self.client.get(key).await.map_err(Error::from_source)
///     }
/// }
/// ```
///
/// # For Consumers
///
/// Extract the underlying error using [`source_as`](Self::source_as):
///
/// ```
/// use larder_store::Error;
///
/// let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
/// let error = Error::from_source(io_err);
/// assert!(error.is_source::<std::io::Error>());
/// ```
#[ohno::error]
#[no_constructors]
#[derive(Clone)]
pub struct Error {}

impl Error {
    /// Creates a new error wrapping a cause.
    pub fn caused_by(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            ohno_core: OhnoCore::from(cause),
        }
    }

    /// Creates a new error wrapping a source error.
    ///
    /// This preserves the original error type for later extraction via
    /// [`source_as`](Self::source_as).
    pub fn from_source(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }

    /// Creates a new error from a message string.
    ///
    /// Use [`from_source`](Self::from_source) instead when wrapping an
    /// existing error.
    pub fn from_message(message: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::caused_by(message)
    }

    /// Returns `true` if the source error is of type `T`.
    #[must_use]
    pub fn is_source<T: StdError + 'static>(&self) -> bool {
        self.source_as::<T>().is_some()
    }

    /// Returns the source error as type `T` if it matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use larder_store::Error;
    ///
    /// let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    /// let error = Error::from_source(io_err);
    ///
    /// if let Some(io_err) = error.source_as::<std::io::Error>() {
    ///     assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);
    /// }
    /// ```
    #[must_use]
    pub fn source_as<T: StdError + 'static>(&self) -> Option<&T> {
        self.source().and_then(|s| s.downcast_ref::<T>())
    }
}

/// A specialized [`Result`] type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
