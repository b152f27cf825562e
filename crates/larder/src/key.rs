//! Cache keys.

use std::{any::Any, sync::Arc};

/// A cache key: an id, optionally carrying opaque parameters.
///
/// The id is the only part of a key the engine looks at - it addresses the
/// store and is the dimension along which concurrent requests coalesce.
/// Parameters ride along untouched and are handed to the generate function,
/// so a producer can receive request context (locale, auth, query options)
/// that has no business being part of the storage address.
///
/// # Examples
///
/// ```
/// use larder::Key;
///
/// let plain: Key = "user:42".into();
/// assert_eq!(plain.id(), "user:42");
///
/// let keyed = Key::with_params("user:42", ("en-US", true));
/// assert_eq!(keyed.params::<(&str, bool)>(), Some(&("en-US", true)));
/// assert_eq!(keyed.params::<u32>(), None);
/// ```
#[derive(Clone)]
pub struct Key {
    id: String,
    params: Option<Arc<dyn Any + Send + Sync>>,
}

impl Key {
    /// Creates a key from an id alone.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: None,
        }
    }

    /// Creates a key carrying parameters for the generate function.
    pub fn with_params(id: impl Into<String>, params: impl Any + Send + Sync) -> Self {
        Self {
            id: id.into(),
            params: Some(Arc::new(params)),
        }
    }

    /// Returns the id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the parameters, downcast to `T`.
    ///
    /// Returns `None` when the key carries no parameters or they are of a
    /// different type.
    #[must_use]
    pub fn params<T: Any>(&self) -> Option<&T> {
        self.params
            .as_deref()
            .and_then(|params| params.downcast_ref())
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("params", &self.params.as_ref().map(|_| ".."))
            .finish()
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Key {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<u64> for Key {
    fn from(id: u64) -> Self {
        Self::new(id.to_string())
    }
}
