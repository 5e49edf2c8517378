use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use super::{ChangeListener, ConfigStore, StoreError};

/// Read-through cache in front of a slower store.
///
/// Only hits are cached, so a later read with a different default still
/// sees that default. Subscribe the cache to the store's change source to
/// keep it coherent; each change evicts the key.
///
/// A read that raced with an eviction is returned but not cached, so an
/// evicted value never comes back.
pub struct CachedStore<S> {
    inner: S,
    cache: RwLock<HashMap<String, String>>,
    // bumped under the cache write lock on every eviction
    generation: AtomicU64,
}

impl<S: ConfigStore> CachedStore<S> {
    /// Wraps `inner` with an empty cache.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the number of cached keys.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Evicts `key` and discards any read of it still in flight.
    pub fn invalidate(&self, key: &str) {
        let mut cache = self.cache.write();
        cache.remove(key);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Evicts every key.
    pub fn clear(&self) {
        let mut cache = self.cache.write();
        cache.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl<S: ConfigStore> ConfigStore for CachedStore<S> {
    fn get(&self, key: &str, default: &str) -> Result<String, StoreError> {
        if let Some(hit) = self.cache.read().get(key) {
            trace!(key, "config cache hit");
            return Ok(hit.clone());
        }

        let started = self.generation.load(Ordering::SeqCst);
        let value = self.inner.get(key, default)?;
        // a value equal to the default may just be a miss
        if value != default {
            let mut cache = self.cache.write();
            if self.generation.load(Ordering::SeqCst) == started {
                cache.insert(key.to_string(), value.clone());
            } else {
                trace!(key, "config changed during read, not caching");
            }
        }
        Ok(value)
    }

    fn shutdown(&self) {
        self.clear();
        self.inner.shutdown();
    }
}

impl<S: ConfigStore> ChangeListener for CachedStore<S> {
    fn on_change(&self, key: &str, _value: &str) {
        self.invalidate(key);
    }
}

impl<S> fmt::Debug for CachedStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedStore")
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChangeSource, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    impl ConfigStore for Counting {
        fn get(&self, key: &str, default: &str) -> Result<String, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key, default)
        }
    }

    fn counting(pairs: &[(&str, &str)]) -> Counting {
        Counting {
            inner: pairs.iter().copied().collect(),
            reads: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_hits_are_served_from_cache() {
        let store = CachedStore::new(counting(&[("a", "1")]));
        assert_eq!(store.get("a", "").unwrap(), "1");
        assert_eq!(store.get("a", "").unwrap(), "1");
        assert_eq!(store.inner().reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let store = CachedStore::new(counting(&[]));
        assert_eq!(store.get("a", "x").unwrap(), "x");
        assert_eq!(store.get("a", "y").unwrap(), "y");
        assert_eq!(store.cached_len(), 0);
    }

    #[test]
    fn test_change_events_evict_entries() {
        let source = Arc::new(MemoryStore::new());
        source.set("a", "1");
        let cached = Arc::new(CachedStore::new(source.clone()));
        source.subscribe(cached.clone());

        assert_eq!(cached.get("a", "").unwrap(), "1");
        source.set("a", "2");
        assert_eq!(cached.get("a", "").unwrap(), "2");
    }

    /// Changes the source the first time it is read, after taking the value.
    struct ChangingDuringRead {
        source: Arc<MemoryStore>,
        changed: AtomicUsize,
    }

    impl ConfigStore for ChangingDuringRead {
        fn get(&self, key: &str, default: &str) -> Result<String, StoreError> {
            let value = self.source.get(key, default)?;
            if self.changed.fetch_add(1, Ordering::SeqCst) == 0 {
                self.source.set(key, "2");
            }
            Ok(value)
        }
    }

    #[test]
    fn test_eviction_during_read_is_not_undone() {
        let source = Arc::new(MemoryStore::new());
        source.set("a", "1");
        let cached = Arc::new(CachedStore::new(ChangingDuringRead {
            source: source.clone(),
            changed: AtomicUsize::new(0),
        }));
        source.subscribe(cached.clone());

        assert_eq!(cached.get("a", "").unwrap(), "1");
        assert_eq!(cached.cached_len(), 0);
        assert_eq!(cached.get("a", "").unwrap(), "2");
        assert_eq!(cached.get("a", "").unwrap(), "2");
    }

    #[test]
    fn test_shutdown_reaches_inner_store() {
        let source = Arc::new(MemoryStore::new());
        source.set("a", "1");
        let cached = CachedStore::new(source.clone());
        cached.get("a", "").unwrap();

        cached.shutdown();

        assert_eq!(cached.cached_len(), 0);
        assert_eq!(source.get("a", ""), Err(StoreError::Closed));
    }
}
