use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use toml::{Table, Value};
use tracing::debug;

use super::{ClassDescriptor, HostError, ObjectDefinition, ObjectRegistry};
use crate::binding::{Configurable, SharedObject};
use crate::config::{load_toml_file, ConfigError};

type Factory = dyn Fn(&ObjectDefinition) -> Result<SharedObject, String> + Send + Sync;

struct ClassEntry {
    descriptor: ClassDescriptor,
    factory: Option<Arc<Factory>>,
}

/// Minimal object container: named definitions, registered classes and
/// lazily built singletons.
///
/// Definitions are visited in name order. An instance is built the first
/// time it is requested, from its definition as it stands at that moment, so
/// objects constructed during a binding pass see resolved properties.
///
/// ## Definition files
///
/// ```toml
/// [objects.database]
/// class = "app.Database"
///
/// [objects.database.properties]
/// url = "${db.url}"
/// pool = ["${db.pool.min}", "${db.pool.max}"]
/// ```
#[derive(Default)]
pub struct Container {
    definitions: BTreeMap<String, ObjectDefinition>,
    classes: HashMap<String, ClassEntry>,
    instances: HashMap<String, SharedObject>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a class resolvable without a way to construct it; instances
    /// must then be supplied through [`register_instance`](Self::register_instance).
    pub fn register_class<T: Configurable>(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.classes.insert(
            name.clone(),
            ClassEntry {
                descriptor: ClassDescriptor::of::<T>(name),
                factory: None,
            },
        );
        self
    }

    /// Makes a class resolvable and constructible from its definition.
    pub fn register_factory<T, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        T: Configurable,
        F: Fn(&ObjectDefinition) -> Result<T, String> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: Arc<Factory> = Arc::new(move |definition: &ObjectDefinition| {
            factory(definition).map(|object| Arc::new(object) as SharedObject)
        });
        self.classes.insert(
            name.clone(),
            ClassEntry {
                descriptor: ClassDescriptor::of::<T>(name),
                factory: Some(factory),
            },
        );
        self
    }

    /// Adds or replaces a definition. A replaced definition loses its instance.
    pub fn add_definition(&mut self, definition: ObjectDefinition) -> &mut Self {
        self.instances.remove(definition.name());
        self.definitions
            .insert(definition.name().to_string(), definition);
        self
    }

    /// Adds an already constructed object under `name`, creating a
    /// definition of class `class_name` if none exists.
    pub fn register_instance<T: Configurable>(
        &mut self,
        name: impl Into<String>,
        class_name: impl Into<String>,
        instance: Arc<T>,
    ) -> &mut Self {
        let name = name.into();
        let class_name = class_name.into();
        if !self.classes.contains_key(&class_name) {
            self.register_class::<T>(class_name.clone());
        }
        self.definitions
            .entry(name.clone())
            .or_insert_with(|| ObjectDefinition::new(name.clone()).with_class(class_name));
        self.instances.insert(name, instance);
        self
    }

    /// Returns the definition named `name`.
    pub fn definition(&self, name: &str) -> Option<&ObjectDefinition> {
        self.definitions.get(name)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if there are no definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Typed handle to an already constructed object.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.instances
            .get(name)
            .cloned()
            .and_then(|object| object.downcast::<T>().ok())
    }

    /// Reads `[objects.<name>]` definitions from a TOML file. Returns how
    /// many were added.
    pub fn load_definitions(&mut self, path: impl AsRef<Path>) -> Result<usize, ConfigError> {
        let table = load_toml_file(path.as_ref(), true)?.unwrap_or_default();
        self.add_definitions_from_table(&table)
    }

    /// Adds definitions from an already parsed table. See
    /// [`load_definitions`](Self::load_definitions).
    pub fn add_definitions_from_table(&mut self, table: &Table) -> Result<usize, ConfigError> {
        let Some(objects) = table.get("objects") else {
            return Ok(0);
        };
        let objects = objects
            .as_table()
            .ok_or_else(|| invalid("objects", "expected a table of definitions"))?;

        let mut added = 0;
        for (name, body) in objects {
            let definition = parse_definition(name, body)?;
            debug!(definition = %name, class = ?definition.class_name(), "loaded object definition");
            self.add_definition(definition);
            added += 1;
        }
        Ok(added)
    }
}

fn parse_definition(name: &str, body: &Value) -> Result<ObjectDefinition, ConfigError> {
    let body = body
        .as_table()
        .ok_or_else(|| invalid(name, "expected a table"))?;

    let mut definition = ObjectDefinition::new(name);
    match body.get("class") {
        None => {}
        Some(Value::String(class)) => definition = definition.with_class(class.clone()),
        Some(_) => return Err(invalid(name, "'class' must be a string")),
    }
    match body.get("properties") {
        None => {}
        Some(Value::Table(properties)) => *definition.properties_mut() = properties.clone(),
        Some(_) => return Err(invalid(name, "'properties' must be a table")),
    }
    Ok(definition)
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidDefinition {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

impl ObjectRegistry for Container {
    fn definition_names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    fn definition_mut(&mut self, name: &str) -> Option<&mut ObjectDefinition> {
        self.definitions.get_mut(name)
    }

    fn resolve_class(&self, class_name: &str) -> Option<ClassDescriptor> {
        self.classes
            .get(class_name)
            .map(|entry| entry.descriptor.clone())
    }

    fn instance(&mut self, name: &str) -> Result<SharedObject, HostError> {
        if let Some(existing) = self.instances.get(name) {
            return Ok(Arc::clone(existing));
        }

        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| HostError::UnknownDefinition(name.to_string()))?;
        let class = definition.class_name().unwrap_or_default();
        let factory = self
            .classes
            .get(class)
            .and_then(|entry| entry.factory.clone())
            .ok_or_else(|| HostError::NoFactory {
                definition: name.to_string(),
                class: class.to_string(),
            })?;

        let object = factory(definition).map_err(|reason| HostError::Construction {
            definition: name.to_string(),
            reason,
        })?;
        debug!(definition = name, class, "constructed managed object");
        self.instances.insert(name.to_string(), Arc::clone(&object));
        Ok(object)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.definitions.len())
            .field("classes", &self.classes.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}
