use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{ChangeListener, ChangeSource, ConfigStore, StoreError};
use crate::config::flatten_table;

/// In-process store, used as a local snapshot of the remote store and in
/// tests. Writes are pushed to every subscribed listener.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store from a (possibly nested) TOML table using dotted keys.
    pub fn from_table(table: &toml::Table) -> Self {
        Self::from_iter(flatten_table(table))
    }

    /// Stores `value` under `key` and notifies listeners.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.values.write().insert(key.clone(), value.clone());
        self.publish(&key, &value);
    }

    /// Removes `key`, notifying listeners with an empty value if it existed.
    pub fn remove(&self, key: &str) -> Option<String> {
        let previous = self.values.write().remove(key);
        if previous.is_some() {
            self.publish(key, "");
        }
        previous
    }

    /// Copy of every key and value.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    fn publish(&self, key: &str, value: &str) {
        // listeners run without any store lock held so they may read back
        let listeners = self.listeners.read().clone();
        debug!(key, listeners = listeners.len(), "publishing config change");
        for listener in listeners {
            listener.on_change(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
            ..Self::default()
        }
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str, default: &str) -> Result<String, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(self
            .values
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.listeners.write().clear();
    }
}

impl ChangeSource for MemoryStore {
    fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.values.read().len())
            .field("listeners", &self.listeners.read().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, String)>>);

    impl ChangeListener for Recorder {
        fn on_change(&self, key: &str, value: &str) {
            self.0.lock().push((key.to_string(), value.to_string()));
        }
    }

    #[test]
    fn test_missing_key_returns_default() {
        let store = MemoryStore::new();
        assert_eq!(store.get("absent", "").unwrap(), "");
        assert_eq!(store.get("absent", "fallback").unwrap(), "fallback");
    }

    #[test]
    fn test_seeds_from_nested_table() {
        let table: toml::Table = toml::from_str("[db]\nhost = \"h\"\nport = 5432\n").unwrap();
        let store = MemoryStore::from_table(&table);
        assert_eq!(store.get("db.host", "").unwrap(), "h");
        assert_eq!(store.get("db.port", "").unwrap(), "5432");
    }

    #[test]
    fn test_set_and_remove_notify_listeners() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder::default());
        store.subscribe(recorder.clone());

        store.set("a", "1");
        assert_eq!(store.remove("a"), Some("1".to_string()));
        assert_eq!(store.remove("a"), None);

        let events = recorder.0.lock().clone();
        assert_eq!(
            events,
            vec![("a".to_string(), "1".to_string()), ("a".to_string(), String::new())]
        );
    }

    #[test]
    fn test_reads_fail_after_shutdown() {
        let store: MemoryStore = [("a", "1")].into_iter().collect();
        store.shutdown();
        assert_eq!(store.get("a", ""), Err(StoreError::Closed));
    }
}
