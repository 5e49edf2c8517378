//! The host side of binding: object definitions, class lookup, instances.
//!
//! [`ObjectRegistry`] is what the walker needs from whatever owns the
//! application's objects. [`Container`] is a small implementation of it for
//! applications without their own.

mod container;

use std::any::{type_name, TypeId};
use std::fmt;

use thiserror::Error;
use toml::{Table, Value};

use crate::binding::{discover, BindingDescriptor, Configurable, SharedObject};

pub use container::Container;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HostError {
    #[error("no object definition named '{0}'")]
    UnknownDefinition(String),

    #[error("definition '{definition}' has no factory for class '{class}'")]
    NoFactory { definition: String, class: String },

    #[error("failed to construct '{definition}': {reason}")]
    Construction { definition: String, reason: String },
}

/// Host-owned description of a managed object.
///
/// Properties are raw TOML values; the walker rewrites `${...}` strings in
/// place before the object is constructed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDefinition {
    name: String,
    class_name: Option<String>,
    properties: Table,
}

impl ObjectDefinition {
    /// Creates a definition with no class and no properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the class name the host resolves.
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Adds or replaces a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Definition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared class name, if any.
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    /// Property table, resolved once the pass has run.
    pub fn properties(&self) -> &Table {
        &self.properties
    }

    /// Mutable property table, used by the pass to rewrite placeholders.
    pub fn properties_mut(&mut self) -> &mut Table {
        &mut self.properties
    }

    /// String property, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// A class known to the host, with its binding declarations.
#[derive(Clone)]
pub struct ClassDescriptor {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    discover: fn() -> Vec<BindingDescriptor>,
}

impl ClassDescriptor {
    /// Describes `T` under the class name `name`.
    pub fn of<T: Configurable>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            discover: discover::<T>,
        }
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `TypeId` of the described type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name, for logs.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Runs discovery for the class's declared bindings.
    pub fn bindings(&self) -> Vec<BindingDescriptor> {
        (self.discover)()
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// What the binding pass needs from the host.
pub trait ObjectRegistry {
    /// Names of every definition, in the order they should be visited.
    fn definition_names(&self) -> Vec<String>;

    fn definition_mut(&mut self, name: &str) -> Option<&mut ObjectDefinition>;

    /// Maps a class name to its descriptor; `None` means the class is unknown.
    fn resolve_class(&self, class_name: &str) -> Option<ClassDescriptor>;

    /// Returns the live object for a definition, constructing it if needed.
    fn instance(&mut self, name: &str) -> Result<SharedObject, HostError>;
}
