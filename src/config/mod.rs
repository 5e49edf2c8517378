//! Layered loading of the binder's own settings and of local store seeds.

mod builder;
mod env;
mod error;
mod file;
mod settings;
mod source;

pub use builder::Config;
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::FileSource;
pub use settings::BinderSettings;
pub use source::{deep_merge, flatten_table, merge_at_path, ConfigSource, SourceLayer};

pub(crate) use file::load_toml_file;
