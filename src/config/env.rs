use toml::Value;

use super::source::{ConfigSource, SourceLayer};
use super::ConfigError;

/// Reads `PREFIX<sep>SECTION<sep>FIELD=value` environment variables.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
    vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
    /// Reads variables named `PREFIX<separator>...` from the process environment.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            vars: None,
        }
    }

    /// Uses a fixed set of variables instead of the process environment.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }
}

impl ConfigSource for EnvSource {
    fn describe(&self) -> String {
        format!("env:{}{}*", self.prefix, self.separator)
    }

    fn layers(&self) -> Result<Vec<SourceLayer>, ConfigError> {
        // an empty separator would split every key into single characters
        if self.separator.is_empty() {
            return Ok(Vec::new());
        }

        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);
        let vars = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };

        let mut layers = Vec::new();
        for (key, value) in vars {
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            if path_str.is_empty() {
                continue;
            }

            let path = path_str
                .split(self.separator.as_str())
                .map(str::to_lowercase)
                .collect();
            layers.push(SourceLayer::at(path, coerce_value(&value)));
        }

        Ok(layers)
    }
}

fn coerce_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }

    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
