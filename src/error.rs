use std::time::Duration;

use thiserror::Error;

use crate::binding::BindError;
use crate::config::ConfigError;
use crate::host::HostError;
use crate::resolve::ResolveError;

/// Top-level error type for the conf-binder library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to resolve properties of '{definition}': {source}")]
    Resolve {
        definition: String,
        source: ResolveError,
    },

    #[error("failed to bind '{definition}': {source}")]
    Bind {
        definition: String,
        source: BindError,
    },

    #[error("class '{class}' of definition '{definition}' cannot be resolved")]
    UnresolvableClass { definition: String, class: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("binding pass exceeded {limit:?} (elapsed {elapsed:?})")]
    PassTimeout { elapsed: Duration, limit: Duration },

    #[error("configuration context requires a store")]
    MissingStore,
}

impl Error {
    /// True for errors that only affect one definition and never abort a pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnresolvableClass { .. })
    }
}
