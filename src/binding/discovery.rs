use tracing::debug;

use super::declare::{BindingDescriptor, Configurable, FieldBinding};
use crate::host::ClassDescriptor;

/// Collects the binding declarations of `T`.
pub fn discover<T: Configurable>() -> Vec<BindingDescriptor> {
    T::bindings()
        .into_iter()
        .map(FieldBinding::into_descriptor)
        .collect()
}

/// Collects the binding declarations of a registered class.
pub fn discover_class(class: &ClassDescriptor) -> Vec<BindingDescriptor> {
    let descriptors = class.bindings();
    if !descriptors.is_empty() {
        debug!(
            class = class.name(),
            fields = descriptors.len(),
            "discovered config bindings"
        );
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LiveValue;

    struct Plain;

    impl Configurable for Plain {}

    struct Bound {
        level: LiveValue<String>,
    }

    crate::bindings! {
        Bound {
            level => "log.level", default = "info";
        }
    }

    #[test]
    fn test_plain_types_have_no_bindings() {
        assert!(discover::<Plain>().is_empty());
        assert!(discover_class(&ClassDescriptor::of::<Plain>("app.Plain")).is_empty());
    }

    #[test]
    fn test_class_descriptor_discovers_declared_fields() {
        let class = ClassDescriptor::of::<Bound>("app.Bound");
        let descriptors = discover_class(&class);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].key, "log.level");
        assert_eq!(descriptors[0].locator.field(), "level");
    }
}
