use std::time::Duration;

use serde::Deserialize;

/// Tunables for a binding pass.
///
/// Every field has a default, so an empty table (or no file at all)
/// deserializes to [`BinderSettings::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BinderSettings {
    /// Most placeholder dereferences one resolution may perform. Reading the
    /// bound key itself is not counted.
    pub max_depth: usize,
    /// Abort the pass on the first field that fails to bind.
    pub fail_fast: bool,
    /// Upper bound on the whole pass, checked between definitions.
    pub pass_timeout_ms: Option<u64>,
    /// Definition name of the processor itself; it is never processed.
    pub self_name: String,
}

impl BinderSettings {
    pub const DEFAULT_MAX_DEPTH: usize = 16;
    pub const DEFAULT_SELF_NAME: &'static str = "conf-binder";

    /// Returns the pass deadline, if one is configured.
    pub fn pass_timeout(&self) -> Option<Duration> {
        self.pass_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            fail_fast: true,
            pass_timeout_ms: None,
            self_name: Self::DEFAULT_SELF_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EnvSource};

    #[test]
    fn test_empty_config_gives_defaults() {
        let settings: BinderSettings = Config::builder().build().unwrap();
        assert_eq!(settings, BinderSettings::default());
        assert_eq!(settings.pass_timeout(), None);
    }

    #[test]
    fn test_env_overrides_individual_fields() {
        let settings: BinderSettings = Config::builder()
            .with_source(EnvSource::new("CB", "__").with_vars([
                ("CB__FAIL_FAST", "false"),
                ("CB__PASS_TIMEOUT_MS", "250"),
            ]))
            .build()
            .unwrap();

        assert!(!settings.fail_fast);
        assert_eq!(settings.pass_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(settings.max_depth, BinderSettings::DEFAULT_MAX_DEPTH);
    }
}
