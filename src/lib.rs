//! Binds fields of managed objects to keys in a configuration store.
//!
//! At startup a [`BindingProcessor`] walks every object definition the host
//! knows about. It rewrites `${key}` placeholders in the definition's
//! properties, then writes store values into the [`LiveValue`] fields each
//! class declares with [`bindings!`]. Fields declared with
//! `live_update = true` are recorded in a [`RefreshRegistry`], which replays
//! later store changes into them.

pub mod binding;
pub mod config;
pub mod context;
mod error;
pub mod host;
pub mod refresh;
pub mod resolve;
pub mod store;
pub mod walker;

pub use binding::{
    BindError, BindingDescriptor, ConfigValue, Configurable, FieldBinder, FieldBinding,
    FieldLocator, LiveValue, SharedObject,
};
pub use config::{BinderSettings, Config, ConfigError};
pub use context::{ConfContext, ConfContextBuilder};
pub use error::Error;
pub use host::{ClassDescriptor, Container, HostError, ObjectDefinition, ObjectRegistry};
pub use refresh::{RefreshRegistry, RefreshReport};
pub use resolve::{PlaceholderResolver, ResolveError};
pub use store::{CachedStore, ChangeListener, ChangeSource, ConfigStore, MemoryStore, StoreError};
pub use walker::{BindingProcessor, ProcessReport};
