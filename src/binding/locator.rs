use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use super::value::{ConfigValue, LiveValue};
use super::BindError;

/// A managed object as the binder sees it.
pub type ManagedObject = dyn Any + Send + Sync;

/// Shared handle to a managed object.
pub type SharedObject = Arc<ManagedObject>;

type ReadFn = dyn Fn(&ManagedObject) -> Result<String, BindError> + Send + Sync;
type WriteFn = dyn Fn(&ManagedObject, &str) -> Result<(), BindError> + Send + Sync;

/// Type-erased read/write access to one [`LiveValue`] field of one type.
///
/// Built once per declared field; the accessor, the downcast and the value
/// coercion are fixed at construction.
#[derive(Clone)]
pub struct FieldLocator {
    owner: &'static str,
    field: &'static str,
    value_type: &'static str,
    read: Arc<ReadFn>,
    write: Arc<WriteFn>,
}

impl FieldLocator {
    /// Builds the read and write paths for one field of `T`.
    pub fn new<T, V, F>(field: &'static str, accessor: F) -> Self
    where
        T: Any + Send + Sync,
        V: ConfigValue,
        F: Fn(&T) -> &LiveValue<V> + Send + Sync + 'static,
    {
        let accessor = Arc::new(accessor);
        let read_accessor = Arc::clone(&accessor);

        let read: Arc<ReadFn> = Arc::new(move |target: &ManagedObject| {
            let target = downcast::<T>(target, field)?;
            Ok((*read_accessor)(target).get().render_config())
        });

        let write: Arc<WriteFn> = Arc::new(move |target: &ManagedObject, raw: &str| {
            let target = downcast::<T>(target, field)?;
            let value = V::parse_config(raw).map_err(|reason| BindError::Coerce {
                owner: type_name::<T>(),
                field,
                ty: type_name::<V>(),
                value: raw.to_string(),
                reason,
            })?;
            (*accessor)(target).set(value);
            Ok(())
        });

        Self {
            owner: type_name::<T>(),
            field,
            value_type: type_name::<V>(),
            read,
            write,
        }
    }

    /// Type name of the struct declaring the field.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Field name as declared.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Type name of the value stored in the field.
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    /// Renders the field's current value.
    pub fn read(&self, target: &ManagedObject) -> Result<String, BindError> {
        (self.read)(target)
    }

    /// Coerces `raw` into the field's type and stores it.
    pub fn write(&self, target: &ManagedObject, raw: &str) -> Result<(), BindError> {
        (self.write)(target, raw)
    }
}

fn downcast<'a, T: Any>(target: &'a ManagedObject, field: &'static str) -> Result<&'a T, BindError> {
    target
        .downcast_ref::<T>()
        .ok_or(BindError::TypeMismatch {
            field,
            expected: type_name::<T>(),
        })
}

impl fmt::Debug for FieldLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldLocator")
            .field("owner", &self.owner)
            .field("field", &self.field)
            .field("value_type", &self.value_type)
            .finish()
    }
}
