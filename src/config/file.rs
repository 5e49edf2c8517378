//! File-based configuration source.

use std::path::{Path, PathBuf};

use super::source::{ConfigSource, SourceLayer};
use super::ConfigError;

/// Loads a TOML file as a root layer.
///
/// Required files that don't exist cause an error; optional ones are skipped.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// A TOML file source. A missing file is an error only when `required`.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }
}

impl ConfigSource for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn layers(&self) -> Result<Vec<SourceLayer>, ConfigError> {
        match load_toml_file(&self.path, self.required)? {
            Some(table) => Ok(vec![SourceLayer::root(table)]),
            None => Ok(vec![]),
        }
    }
}

/// Reads and parses a TOML file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
pub(crate) fn load_toml_file(
    path: &Path,
    required: bool,
) -> Result<Option<toml::Table>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
