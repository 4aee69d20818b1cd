//! Bound argument values.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

/// A value produced by a type descriptor.
///
/// # Examples
///
/// ```
/// use cmdpipe_runtime::Value;
///
/// let v = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
/// assert_eq!(v.to_string(), "1, 2");
/// assert_eq!(v.as_list().map(|items| items.len()), Some(2));
/// assert_eq!(Value::Text("x".into()).as_str(), Some("x"));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Text(String),
    Integer(i64),
    Float(f64),
    Char(char),
    Path(PathBuf),
    DateTime(DateTime<FixedOffset>),
    /// Canonical variant name of an enum value.
    Enum(String),
    List(Vec<Value>),
    Custom(CustomValue),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text and enum values as `&str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Floats, and integers widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrows the inner value of a custom type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Custom(custom) => custom.downcast_ref(),
            _ => None,
        }
    }

    /// JSON rendering used by parse reports and the CLI echo handler.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Value::from(*n),
            Value::List(items) => items.iter().map(Value::to_json).collect(),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => {
                a.type_name == b.type_name && a.display == b.display
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) | Value::Enum(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(", "))
            }
            Value::Custom(custom) => f.write_str(&custom.display),
        }
    }
}

/// A value of a type supplied outside the built-in set.
#[derive(Clone)]
pub struct CustomValue {
    type_name: String,
    display: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    /// Wraps `value`, remembering its display form for reports and equality.
    pub fn new<T>(type_name: &str, value: T) -> Self
    where
        T: Any + fmt::Display + Send + Sync,
    {
        Self {
            type_name: type_name.to_string(),
            display: value.to_string(),
            inner: Arc::new(value),
        }
    }

    /// Name of the custom type this value was parsed as.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("type_name", &self.type_name)
            .field("display", &self.display)
            .finish()
    }
}
