//! Client-side view of the remote configuration store.
//!
//! The binder only needs two capabilities from a store: a keyed read that
//! falls back to a caller-supplied default, and a way to hear about changes.
//! Durability and distribution are the store's business.

mod cached;
mod memory;

use std::sync::Arc;

use thiserror::Error;

pub use cached::CachedStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("config store unavailable while reading '{key}': {reason}")]
    Unavailable { key: String, reason: String },

    #[error("config store has been shut down")]
    Closed,
}

impl StoreError {
    /// Shorthand for [`StoreError::Unavailable`].
    pub fn unavailable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Keyed read access to a configuration store.
pub trait ConfigStore: Send + Sync {
    /// Returns the value held for `key`, or `default` when the store has no
    /// entry. A missing key is never an error.
    fn get(&self, key: &str, default: &str) -> Result<String, StoreError>;

    /// Releases connections and caches. Called once during orderly shutdown.
    fn shutdown(&self) {}
}

impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    fn get(&self, key: &str, default: &str) -> Result<String, StoreError> {
        (**self).get(key, default)
    }

    fn shutdown(&self) {
        (**self).shutdown();
    }
}

/// Receives `(key, new_value)` events from a [`ChangeSource`].
///
/// A removed key is delivered with an empty value.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, key: &str, value: &str);
}

/// Anything that can push change events to listeners.
pub trait ChangeSource {
    fn subscribe(&self, listener: Arc<dyn ChangeListener>);
}
