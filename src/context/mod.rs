//! Wiring of store, resolver, binder and refresh registry.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::binding::FieldBinder;
use crate::config::BinderSettings;
use crate::host::ObjectRegistry;
use crate::refresh::{RefreshRegistry, RefreshReport};
use crate::resolve::PlaceholderResolver;
use crate::store::{ChangeSource, ConfigStore};
use crate::walker::{BindingProcessor, ProcessReport};
use crate::Error;

/// Owns the binding machinery for one application.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use conf_binder::{bindings, ConfContext, Container, LiveValue, MemoryStore, ObjectDefinition};
///
/// #[derive(Default)]
/// struct Database {
///     host: LiveValue<String>,
/// }
///
/// bindings! {
///     Database {
///         host => "db.host", live_update = true;
///     }
/// }
///
/// let store = Arc::new(MemoryStore::from_iter([("db.host", "10.0.0.5")]));
/// let ctx = ConfContext::builder().with_store(store.clone()).build()?;
/// ctx.subscribe(store.as_ref());
///
/// let mut container = Container::new();
/// container
///     .register_factory("app.Database", |_: &ObjectDefinition| Ok(Database::default()))
///     .add_definition(ObjectDefinition::new("database").with_class("app.Database"));
/// ctx.process(&mut container)?;
///
/// store.set("db.host", "10.0.0.9");
/// assert_eq!(container.get::<Database>("database").unwrap().host.value(), "10.0.0.9");
///
/// ctx.shutdown();
/// # Ok::<(), conf_binder::Error>(())
/// ```
pub struct ConfContext {
    store: Arc<dyn ConfigStore>,
    refresh: Arc<RefreshRegistry>,
    processor: BindingProcessor,
}

impl ConfContext {
    /// Starts a builder; a store is required.
    pub fn builder() -> ConfContextBuilder {
        ConfContextBuilder::default()
    }

    /// Returns the settings the pass runs with.
    pub fn settings(&self) -> &BinderSettings {
        self.processor.settings()
    }

    /// Returns a reference to the config store.
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Returns the live-update registry.
    pub fn refresh(&self) -> &Arc<RefreshRegistry> {
        &self.refresh
    }

    /// Runs the startup pass over `registry`.
    pub fn process<R>(&self, registry: &mut R) -> Result<ProcessReport, Error>
    where
        R: ObjectRegistry + ?Sized,
    {
        self.processor.process_all(registry)
    }

    /// Routes change events from `source` into the refresh registry.
    pub fn subscribe<S: ChangeSource + ?Sized>(&self, source: &S) {
        source.subscribe(self.refresh.clone());
    }

    /// Delivers one change event directly, bypassing any change source.
    pub fn notify(&self, key: &str, value: &str) -> RefreshReport {
        self.refresh.notify(key, value)
    }

    /// Drops all refresh registrations and shuts the store down.
    pub fn shutdown(&self) {
        self.refresh.clear();
        self.store.shutdown();
        info!("config context shut down");
    }
}

impl fmt::Debug for ConfContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfContext")
            .field("refresh", &self.refresh)
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ConfContext`].
#[derive(Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfContextBuilder {
    store: Option<Arc<dyn ConfigStore>>,
    settings: BinderSettings,
}

impl ConfContextBuilder {
    /// Uses `store` as the config store.
    pub fn with_store<S: ConfigStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Uses an already shared store.
    pub fn with_shared_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the default [`BinderSettings`].
    pub fn with_settings(mut self, settings: BinderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns [`Error::MissingStore`] if no store was provided.
    pub fn build(self) -> Result<ConfContext, Error> {
        let store = self.store.ok_or(Error::MissingStore)?;
        let resolver =
            PlaceholderResolver::new(Arc::clone(&store)).with_max_depth(self.settings.max_depth);
        let refresh = Arc::new(RefreshRegistry::new(resolver.clone()));
        let binder = FieldBinder::new(resolver).with_refresh(Arc::clone(&refresh));

        Ok(ConfContext {
            store,
            refresh,
            processor: BindingProcessor::new(binder, self.settings),
        })
    }
}
