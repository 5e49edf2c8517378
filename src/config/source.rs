//! Layer sources and the table operations used to stack them.

use std::collections::BTreeMap;

use toml::{Table, Value};

use super::ConfigError;

/// A value contributed by a source, mounted at `path` in the merged table.
///
/// An empty path mounts a whole table at the root.
#[derive(Debug, Clone)]
pub struct SourceLayer {
    pub path: Vec<String>,
    pub value: Value,
}

impl SourceLayer {
    /// A layer covering the whole table.
    pub fn root(table: Table) -> Self {
        Self {
            path: Vec::new(),
            value: Value::Table(table),
        }
    }

    /// A layer mounted at `path`.
    pub fn at(path: Vec<String>, value: Value) -> Self {
        Self { path, value }
    }
}

/// Something that contributes layers to a [`Config`](super::Config) build.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Short label used in logs.
    fn describe(&self) -> String;

    fn layers(&self) -> Result<Vec<SourceLayer>, ConfigError>;
}

/// Merges `value` into `table` at the given dotted path, creating
/// intermediate tables as needed. Tables merge recursively, anything else
/// replaces what was there.
pub fn merge_at_path(table: &mut Table, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Table(overlay) = value {
            deep_merge(table, overlay);
        }
        return;
    };

    if rest.is_empty() {
        match (table.get_mut(first), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => deep_merge(base, overlay),
            (_, value) => {
                table.insert(first.clone(), value);
            }
        }
        return;
    }

    if !matches!(table.get(first), Some(Value::Table(_))) {
        table.insert(first.clone(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(first) {
        merge_at_path(nested, rest, value);
    }
}

/// Merges `overlay` into `base`; nested tables merge, other values replace.
pub fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Flattens nested tables into dotted keys with string values.
///
/// `[db] host = "x"` becomes `db.host = "x"`. Scalars are rendered with
/// their TOML display form (strings unquoted); arrays become comma
/// separated lists of their scalar items.
pub fn flatten_table(table: &Table) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(&mut out, "", table);
    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, table: &Table) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Table(nested) => flatten_into(out, &full, nested),
            Value::Array(items) => {
                let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(",");
                out.insert(full, joined);
            }
            other => {
                out.insert(full, scalar_text(other));
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(dt) => dt.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn test_merge_creates_intermediate_tables() {
        let mut base = Table::new();
        merge_at_path(
            &mut base,
            &["db".into(), "pool".into(), "size".into()],
            Value::Integer(4),
        );
        assert_eq!(base["db"]["pool"]["size"].as_integer(), Some(4));
    }

    #[test]
    fn test_merge_overrides_scalars_and_keeps_siblings() {
        let mut base = table(
            r#"
            [db]
            host = "a"
            port = 1
            "#,
        );
        merge_at_path(&mut base, &["db".into(), "host".into()], Value::String("b".into()));
        assert_eq!(base["db"]["host"].as_str(), Some("b"));
        assert_eq!(base["db"]["port"].as_integer(), Some(1));
    }

    #[test]
    fn test_flatten_uses_dotted_keys() {
        let flat = flatten_table(&table(
            r#"
            name = "svc"
            [db]
            host = "${env.host}"
            port = 5432
            replicas = ["r1", "r2"]
            [db.pool]
            enabled = true
            "#,
        ));
        assert_eq!(flat["name"], "svc");
        assert_eq!(flat["db.host"], "${env.host}");
        assert_eq!(flat["db.port"], "5432");
        assert_eq!(flat["db.replicas"], "r1,r2");
        assert_eq!(flat["db.pool.enabled"], "true");
    }
}
