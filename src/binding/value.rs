//! Field storage and string coercion for bound values.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

/// A bound field.
///
/// The current value sits behind an `Arc` that is swapped whole on every
/// write, so a reader either sees the old value or the new one, never a mix.
/// Readers holding a snapshot from [`get`](Self::get) keep it alive across
/// later writes.
pub struct LiveValue<T> {
    current: RwLock<Arc<T>>,
}

impl<T> LiveValue<T> {
    /// Creates a field holding `initial` until the first bind.
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&*self.current.read())
    }

    /// Replaces the value, returning the previous one.
    pub fn set(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        std::mem::replace(&mut *self.current.write(), next)
    }
}

impl<T: Clone> LiveValue<T> {
    /// Clone of the current value.
    pub fn value(&self) -> T {
        T::clone(&**self.current.read())
    }
}

impl<T: Default> Default for LiveValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for LiveValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveValue").field(&*self.current.read()).finish()
    }
}

/// Conversion between a field's type and the store's string values.
pub trait ConfigValue: Sized + Send + Sync + 'static {
    fn parse_config(raw: &str) -> Result<Self, String>;

    fn render_config(&self) -> String;
}

impl ConfigValue for String {
    fn parse_config(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn render_config(&self) -> String {
        self.clone()
    }
}

impl ConfigValue for bool {
    fn parse_config(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(format!("expected true or false, got '{raw}'"))
        }
    }

    fn render_config(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for PathBuf {
    fn parse_config(raw: &str) -> Result<Self, String> {
        Ok(PathBuf::from(raw))
    }

    fn render_config(&self) -> String {
        self.display().to_string()
    }
}

macro_rules! parsed_config_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ConfigValue for $ty {
                fn parse_config(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }

                fn render_config(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

parsed_config_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char);

/// An empty value maps to `None`.
impl<T: ConfigValue> ConfigValue for Option<T> {
    fn parse_config(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            T::parse_config(raw).map(Some)
        }
    }

    fn render_config(&self) -> String {
        self.as_ref().map(T::render_config).unwrap_or_default()
    }
}

/// Comma separated; items are trimmed and an empty value is an empty list.
impl<T: ConfigValue> ConfigValue for Vec<T> {
    fn parse_config(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',').map(|item| T::parse_config(item.trim())).collect()
    }

    fn render_config(&self) -> String {
        self.iter().map(T::render_config).collect::<Vec<_>>().join(",")
    }
}
