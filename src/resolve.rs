//! Placeholder resolution through the config store.
//!
//! A string is a placeholder only when the whole value is wrapped in
//! `${` and `}`. `"${db.host}"` is a placeholder; `"http://${db.host}"`
//! and `"${a}-${b}"` are not, and are returned unchanged. Resolving a
//! placeholder reads its key from the store and repeats while the result
//! is itself a placeholder, so chains like `a -> ${b} -> ${c} -> x` collapse
//! to `x` in one call.
//!
//! A value written as `$${...}` is never a placeholder. The extra `$` is
//! stripped only where a value leaves the resolver for good: when the binder
//! writes a field and when [`PlaceholderResolver::resolve_table`] rewrites a
//! definition property. `$${name}` therefore arrives as the literal text
//! `${name}` on both paths, while [`PlaceholderResolver::resolve`] stays
//! idempotent.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use toml::{Table, Value};
use tracing::info;

use crate::store::{ConfigStore, StoreError};

pub const PLACEHOLDER_PREFIX: &str = "${";
pub const PLACEHOLDER_SUFFIX: &str = "}";
const ESCAPED_PREFIX: &str = "$${";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("circular placeholder reference at '{key}' (chain: {})", .chain.join(" -> "))]
    Cycle { key: String, chain: Vec<String> },

    #[error("placeholder chain starting at '{start}' is deeper than {max_depth}")]
    DepthExceeded { start: String, max_depth: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Returns true if the whole string is a `${key}` placeholder.
pub fn is_reference(value: &str) -> bool {
    reference_key(value).is_some()
}

/// Returns the key inside a `${key}` placeholder.
pub fn reference_key(value: &str) -> Option<&str> {
    value
        .strip_prefix(PLACEHOLDER_PREFIX)?
        .strip_suffix(PLACEHOLDER_SUFFIX)
}

/// Turns an escaped `$${key}` into the literal text `${key}`.
pub fn unescape(value: &str) -> Cow<'_, str> {
    if value.starts_with(ESCAPED_PREFIX) && value.ends_with(PLACEHOLDER_SUFFIX) {
        Cow::Owned(value[1..].to_string())
    } else {
        Cow::Borrowed(value)
    }
}

/// Dereferences placeholders against a [`ConfigStore`].
#[derive(Clone)]
pub struct PlaceholderResolver {
    store: Arc<dyn ConfigStore>,
    max_depth: usize,
}

impl PlaceholderResolver {
    /// Creates a resolver over `store` with the default depth limit.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            max_depth: crate::BinderSettings::DEFAULT_MAX_DEPTH,
        }
    }

    /// Caps the number of dereferences a single resolution may perform.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Returns the dereference limit used by [`resolve`](Self::resolve) and
    /// [`resolve_key`](Self::resolve_key).
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the store placeholders are read from.
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Resolves `input` to its final value.
    ///
    /// Literals come back unchanged. A placeholder whose key is absent from
    /// the store resolves to the empty string.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Cycle`] when a key repeats within the chain,
    /// [`ResolveError::DepthExceeded`] when the chain is longer than the
    /// configured maximum, and [`ResolveError::Store`] when a read fails.
    pub fn resolve(&self, input: &str) -> Result<String, ResolveError> {
        self.follow(input.to_string(), Vec::new())
    }

    /// Reads `key` with the given default and resolves whatever comes back.
    ///
    /// The default only applies to `key` itself; keys reached through
    /// placeholders default to the empty string. Reading `key` does not count
    /// against the depth limit, so `key -> ${a} -> x` needs a depth of one,
    /// the same as `resolve("${a}")`.
    pub fn resolve_key(&self, key: &str, default: &str) -> Result<String, ResolveError> {
        let value = self.store.get(key, default)?;
        self.follow(value, vec![key.to_string()])
    }

    // `chain` tracks keys for cycle detection; `hops` counts dereferences.
    fn follow(&self, mut current: String, mut chain: Vec<String>) -> Result<String, ResolveError> {
        let mut hops = 0;
        while let Some(key) = reference_key(&current) {
            let key = key.to_string();
            if chain.contains(&key) {
                return Err(ResolveError::Cycle { key, chain });
            }
            if hops >= self.max_depth {
                return Err(ResolveError::DepthExceeded {
                    start: chain.into_iter().next().unwrap_or(key),
                    max_depth: self.max_depth,
                });
            }

            let value = self.store.get(&key, "")?;
            info!(key = %key, value = %value, "resolved placeholder");
            chain.push(key);
            hops += 1;
            current = value;
        }
        Ok(current)
    }

    /// Resolves every string in a property table, descending into nested
    /// tables and arrays, and unescapes `$${...}` literals. Returns how many
    /// values changed.
    ///
    /// Run it once per table; a second pass would treat the unescaped
    /// `${...}` text as a placeholder.
    pub fn resolve_table(&self, table: &mut Table) -> Result<usize, ResolveError> {
        let mut count = 0;
        for (_key, value) in table.iter_mut() {
            count += self.resolve_value(value)?;
        }
        Ok(count)
    }

    /// Resolves a single property value in place. See
    /// [`resolve_table`](Self::resolve_table).
    pub fn resolve_value(&self, value: &mut Value) -> Result<usize, ResolveError> {
        match value {
            Value::String(s) => {
                let resolved = if is_reference(s) {
                    self.resolve(s)?
                } else {
                    s.clone()
                };
                let resolved = unescape(&resolved).into_owned();
                let changed = usize::from(resolved != *s);
                *s = resolved;
                Ok(changed)
            }
            Value::Table(t) => self.resolve_table(t),
            Value::Array(items) => {
                let mut count = 0;
                for item in items.iter_mut() {
                    count += self.resolve_value(item)?;
                }
                Ok(count)
            }
            _ => Ok(0),
        }
    }
}

impl fmt::Debug for PlaceholderResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderResolver")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}
