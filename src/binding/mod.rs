//! Field-level binding: declarations, discovery, and dynamic writes.

mod binder;
mod declare;
mod discovery;
mod error;
mod locator;
mod value;

pub use binder::FieldBinder;
pub use declare::{BindingDescriptor, Configurable, FieldBinding};
pub use discovery::{discover, discover_class};
pub use error::BindError;
pub use locator::{FieldLocator, ManagedObject, SharedObject};
pub use value::{ConfigValue, LiveValue};

pub(crate) use binder::apply_value;
