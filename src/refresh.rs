//! Replays config changes into fields that asked for live updates.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::binding::{apply_value, BindError, BindingDescriptor, ManagedObject, SharedObject};
use crate::resolve::PlaceholderResolver;
use crate::store::ChangeListener;

/// One live-update field of one object.
///
/// The object is held weakly; once the application drops it the entry is
/// pruned on the next notification for its key.
#[derive(Clone)]
pub struct RefreshEntry {
    target: Weak<ManagedObject>,
    descriptor: BindingDescriptor,
}

impl RefreshEntry {
    /// Config key the entry listens on.
    pub fn key(&self) -> &str {
        &self.descriptor.key
    }

    /// Binding applied on each change.
    pub fn descriptor(&self) -> &BindingDescriptor {
        &self.descriptor
    }

    /// The bound object, unless it has been dropped.
    pub fn target(&self) -> Option<SharedObject> {
        self.target.upgrade()
    }

    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl fmt::Debug for RefreshEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshEntry")
            .field("key", &self.descriptor.key)
            .field("field", &self.descriptor.locator)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Outcome of one [`RefreshRegistry::notify`] call.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub updated: usize,
    pub dropped: usize,
    pub failures: Vec<(&'static str, BindError)>,
}

/// Live-update registrations, keyed by config key.
pub struct RefreshRegistry {
    resolver: PlaceholderResolver,
    entries: RwLock<HashMap<String, Vec<RefreshEntry>>>,
}

impl RefreshRegistry {
    /// Creates an empty registry that resolves new values through `resolver`.
    pub fn new(resolver: PlaceholderResolver) -> Self {
        Self {
            resolver,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Records `descriptor` on `target` under the descriptor's key. Only a
    /// weak reference to `target` is kept.
    pub fn register(&self, target: &SharedObject, descriptor: BindingDescriptor) {
        debug!(
            key = %descriptor.key,
            object = descriptor.locator.owner(),
            field = descriptor.locator.field(),
            "registered live config field"
        );
        let entry = RefreshEntry {
            target: Arc::downgrade(target),
            descriptor,
        };
        self.entries
            .write()
            .entry(entry.descriptor.key.clone())
            .or_default()
            .push(entry);
    }

    /// Writes `value` into every live field bound to `key`.
    ///
    /// The value goes through the same resolve-and-write path as the initial
    /// bind. An empty value (a removed key) falls back to each field's
    /// declared default. A failing field is logged and reported without
    /// stopping the others.
    pub fn notify(&self, key: &str, value: &str) -> RefreshReport {
        let entries = self.entries_for(key);
        let mut report = RefreshReport::default();

        for entry in &entries {
            let Some(target) = entry.target() else {
                report.dropped += 1;
                continue;
            };
            let raw = if value.is_empty() {
                entry.descriptor.default_value.as_str()
            } else {
                value
            };
            match apply_value(&self.resolver, target.as_ref(), &entry.descriptor, raw) {
                Ok(resolved) => {
                    report.updated += 1;
                    info!(key, value = %resolved, field = entry.descriptor.locator.field(), "refreshed config field");
                }
                Err(err) => {
                    warn!(key, field = entry.descriptor.locator.field(), error = %err, "config refresh failed");
                    report.failures.push((entry.descriptor.locator.field(), err));
                }
            }
        }

        if report.dropped > 0 {
            self.prune(key);
        }
        report
    }

    /// Entries registered for `key`, including any whose object has been dropped.
    pub fn entries_for(&self, key: &str) -> Vec<RefreshEntry> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Total number of registered fields.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// Returns true if no field is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn prune(&self, key: &str) {
        let mut entries = self.entries.write();
        if let Some(list) = entries.get_mut(key) {
            list.retain(RefreshEntry::is_alive);
            if list.is_empty() {
                entries.remove(key);
            }
        }
    }
}

impl ChangeListener for RefreshRegistry {
    fn on_change(&self, key: &str, value: &str) {
        self.notify(key, value);
    }
}

impl fmt::Debug for RefreshRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRegistry")
            .field("keys", &self.entries.read().len())
            .field("fields", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{discover, FieldBinder};
    use crate::store::{ChangeSource, MemoryStore};
    use crate::LiveValue;

    #[derive(Default)]
    struct Endpoint {
        host: LiveValue<String>,
        retries: LiveValue<u8>,
    }

    crate::bindings! {
        Endpoint {
            host => "db.host", default = "localhost", live_update = true;
            retries => "db.retries", default = "3", live_update = true;
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        binder: FieldBinder,
        refresh: Arc<RefreshRegistry>,
    }

    fn fixture(pairs: &[(&str, &str)]) -> Fixture {
        let store: Arc<MemoryStore> = Arc::new(pairs.iter().copied().collect());
        let resolver = PlaceholderResolver::new(store.clone());
        let refresh = Arc::new(RefreshRegistry::new(resolver.clone()));
        let binder = FieldBinder::new(resolver).with_refresh(Arc::clone(&refresh));
        Fixture {
            store,
            binder,
            refresh,
        }
    }

    fn bound(fx: &Fixture) -> Arc<Endpoint> {
        let endpoint = Arc::new(Endpoint::default());
        let shared: SharedObject = endpoint.clone();
        fx.binder.bind(&shared, &discover::<Endpoint>()).unwrap();
        endpoint
    }

    #[test]
    fn test_notify_writes_resolved_value() {
        let fx = fixture(&[("db.host", "a"), ("env.host2", "10.0.0.9")]);
        let endpoint = bound(&fx);

        let report = fx.refresh.notify("db.host", "${env.host2}");

        assert_eq!(report.updated, 1);
        assert_eq!(endpoint.host.value(), "10.0.0.9");
    }

    #[test]
    fn test_notify_reaches_every_object_on_the_key() {
        let fx = fixture(&[]);
        let first = bound(&fx);
        let second = bound(&fx);

        let report = fx.refresh.notify("db.retries", "9");

        assert_eq!(report.updated, 2);
        assert_eq!(*first.retries.get(), 9);
        assert_eq!(*second.retries.get(), 9);
        assert_eq!(first.host.value(), "localhost");
    }

    #[test]
    fn test_removed_key_falls_back_to_default() {
        let fx = fixture(&[("db.host", "a")]);
        let endpoint = bound(&fx);

        fx.refresh.notify("db.host", "");

        assert_eq!(endpoint.host.value(), "localhost");
    }

    #[test]
    fn test_dropped_objects_are_pruned() {
        let fx = fixture(&[]);
        let kept = bound(&fx);
        drop(bound(&fx));

        let report = fx.refresh.notify("db.host", "b");

        assert_eq!(report.updated, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(fx.refresh.entries_for("db.host").len(), 1);
        assert_eq!(kept.host.value(), "b");
    }

    #[test]
    fn test_bad_value_is_reported_and_keeps_old_value() {
        let fx = fixture(&[]);
        let endpoint = bound(&fx);

        let report = fx.refresh.notify("db.retries", "lots");

        assert_eq!(report.updated, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "retries");
        assert_eq!(*endpoint.retries.get(), 3);
    }

    #[test]
    fn test_unknown_key_is_a_no_op() {
        let fx = fixture(&[]);
        let _endpoint = bound(&fx);

        let report = fx.refresh.notify("other", "x");

        assert_eq!(report.updated, 0);
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn test_store_changes_flow_through_subscription() {
        let fx = fixture(&[("env.host", "10.0.0.5")]);
        fx.store.subscribe(fx.refresh.clone());
        let endpoint = bound(&fx);

        fx.store.set("env.host2", "10.0.0.9");
        fx.store.set("db.host", "${env.host2}");

        assert_eq!(endpoint.host.value(), "10.0.0.9");
    }
}
