use std::any::Any;
use std::marker::PhantomData;

use super::locator::FieldLocator;
use super::value::{ConfigValue, LiveValue};

/// A type whose fields can be bound to config keys.
///
/// Most managed types declare nothing; the default is an empty list. Types
/// that do declare bindings usually go through [`bindings!`](crate::bindings).
pub trait Configurable: Any + Send + Sync {
    fn bindings() -> Vec<FieldBinding<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Declaration that one field of `T` takes its value from a config key.
pub struct FieldBinding<T> {
    key: String,
    default_value: String,
    live_update: bool,
    locator: FieldLocator,
    _owner: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> FieldBinding<T> {
    /// Declares that `field`, reached through `accessor`, is bound to `key`.
    pub fn new<V, F>(field: &'static str, key: impl Into<String>, accessor: F) -> Self
    where
        V: ConfigValue,
        F: Fn(&T) -> &LiveValue<V> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            default_value: String::new(),
            live_update: false,
            locator: FieldLocator::new::<T, V, F>(field, accessor),
            _owner: PhantomData,
        }
    }

    /// Value used when the store has no entry for the key.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Re-apply the field whenever the key changes.
    pub fn live_update(mut self, enabled: bool) -> Self {
        self.live_update = enabled;
        self
    }

    /// Erases the owner type for discovery.
    pub fn into_descriptor(self) -> BindingDescriptor {
        BindingDescriptor {
            key: self.key,
            default_value: self.default_value,
            live_update: self.live_update,
            locator: self.locator,
        }
    }
}

/// Type-erased form of a [`FieldBinding`], as produced by discovery.
#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    pub key: String,
    pub default_value: String,
    pub live_update: bool,
    pub locator: FieldLocator,
}

/// Implements [`Configurable`] from a list of field declarations.
///
/// Each line names a [`LiveValue`] field, its key, and optionally a default
/// value and the live-update flag:
///
/// ```
/// use conf_binder::{bindings, LiveValue};
///
/// #[derive(Default)]
/// struct Database {
///     host: LiveValue<String>,
///     port: LiveValue<u16>,
///     pool: LiveValue<Option<u32>>,
/// }
///
/// bindings! {
///     Database {
///         host => "db.host", live_update = true;
///         port => "db.port", default = "5432";
///         pool => "db.pool.size";
///     }
/// }
/// ```
#[macro_export]
macro_rules! bindings {
    (
        $ty:ty {
            $(
                $field:ident => $key:expr
                $(, default = $default:expr)?
                $(, live_update = $live:expr)?
            );* $(;)?
        }
    ) => {
        impl $crate::Configurable for $ty {
            fn bindings() -> ::std::vec::Vec<$crate::FieldBinding<Self>> {
                ::std::vec![
                    $(
                        $crate::FieldBinding::<Self>::new(
                            ::std::stringify!($field),
                            $key,
                            |target: &Self| &target.$field,
                        )
                        $(.default_value($default))?
                        $(.live_update($live))?
                    ),*
                ]
            }
        }
    };
}
