use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::env::EnvSource;
use super::file::FileSource;
use super::source::{merge_at_path, ConfigSource};
use super::ConfigError;

/// Layered loader for TOML files and environment variables.
///
/// Layers are merged in registration order, later layers overriding earlier
/// ones. Nested tables merge recursively; other values (including arrays)
/// are replaced entirely.
///
/// `${...}` placeholders are left untouched here. When the merged table
/// seeds a [`MemoryStore`](crate::MemoryStore) they are dereferenced through
/// the store at bind time.
///
/// ## Example
///
/// ```no_run
/// use conf_binder::{BinderSettings, Config};
///
/// let settings: BinderSettings = Config::builder()
///     .with_file("config/binder.toml", false)
///     .with_env("CONF_BINDER", "__")
///     .build()?;
/// # Ok::<(), conf_binder::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl Config {
    /// Starts an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a TOML file. Missing optional files are skipped.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Adds `PREFIX<sep>SECTION<sep>FIELD` environment variables.
    ///
    /// Path segments are lowercased; values are coerced to integer, float,
    /// boolean or string.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Adds any [`ConfigSource`]. Later sources override earlier ones.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Merges every layer into a single table.
    pub fn build_table(self) -> Result<toml::Table, ConfigError> {
        let mut merged = toml::Table::new();

        for source in &self.sources {
            let layers = source.layers()?;
            debug!(source = %source.describe(), layers = layers.len(), "merging config source");
            for layer in layers {
                merge_at_path(&mut merged, &layer.path, layer.value);
            }
        }

        Ok(merged)
    }

    /// Merges every layer and deserializes the result.
    pub fn build<T: DeserializeOwned>(self) -> Result<T, ConfigError> {
        let merged = self.build_table()?;
        toml::Value::Table(merged)
            .try_into()
            .map_err(ConfigError::DeserializeError)
    }
}
