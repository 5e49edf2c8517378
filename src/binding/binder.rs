use std::sync::Arc;

use tracing::info;

use super::declare::BindingDescriptor;
use super::locator::{ManagedObject, SharedObject};
use super::BindError;
use crate::refresh::RefreshRegistry;
use crate::resolve::{unescape, PlaceholderResolver};

/// Writes store values into the declared fields of managed objects.
#[derive(Debug, Clone)]
pub struct FieldBinder {
    resolver: PlaceholderResolver,
    refresh: Option<Arc<RefreshRegistry>>,
}

impl FieldBinder {
    /// Creates a binder that reads through `resolver` and registers nothing.
    pub fn new(resolver: PlaceholderResolver) -> Self {
        Self {
            resolver,
            refresh: None,
        }
    }

    /// Live-update bindings are registered here after their first write.
    pub fn with_refresh(mut self, registry: Arc<RefreshRegistry>) -> Self {
        self.refresh = Some(registry);
        self
    }

    /// Returns the resolver field values are read through.
    pub fn resolver(&self) -> &PlaceholderResolver {
        &self.resolver
    }

    /// Binds every descriptor on `target`, in order, and returns how many
    /// fields were written.
    ///
    /// Each field reads its key with its own default, resolves any
    /// placeholder chain, and is written before it is registered for
    /// refresh. The first failure stops the remaining descriptors.
    pub fn bind(
        &self,
        target: &SharedObject,
        descriptors: &[BindingDescriptor],
    ) -> Result<usize, BindError> {
        for descriptor in descriptors {
            let value = self
                .resolver
                .resolve_key(&descriptor.key, &descriptor.default_value)
                .map_err(|source| BindError::Resolve {
                    key: descriptor.key.clone(),
                    source,
                })?;
            write_resolved(target.as_ref(), descriptor, &value)?;

            if descriptor.live_update {
                if let Some(refresh) = &self.refresh {
                    refresh.register(target, descriptor.clone());
                }
            }
        }
        Ok(descriptors.len())
    }

    /// Resolves `raw` and writes it into one field. Returns the resolved value.
    pub fn apply(
        &self,
        target: &ManagedObject,
        descriptor: &BindingDescriptor,
        raw: &str,
    ) -> Result<String, BindError> {
        apply_value(&self.resolver, target, descriptor, raw)
    }
}

/// Single-field write path shared by the initial bind and refresh.
pub(crate) fn apply_value(
    resolver: &PlaceholderResolver,
    target: &ManagedObject,
    descriptor: &BindingDescriptor,
    raw: &str,
) -> Result<String, BindError> {
    let value = resolver.resolve(raw).map_err(|source| BindError::Resolve {
        key: descriptor.key.clone(),
        source,
    })?;
    write_resolved(target, descriptor, &value)?;
    Ok(value)
}

fn write_resolved(
    target: &ManagedObject,
    descriptor: &BindingDescriptor,
    value: &str,
) -> Result<(), BindError> {
    descriptor.locator.write(target, &unescape(value))?;
    info!(
        object = descriptor.locator.owner(),
        field = descriptor.locator.field(),
        key = %descriptor.key,
        value,
        "bound config field"
    );
    Ok(())
}
