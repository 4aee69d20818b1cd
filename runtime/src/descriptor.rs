//! Type descriptors: text-to-value conversion per declared value type.
//!
//! The [`TypeRegistry`] asks three tiers in order and uses the first
//! descriptor that supports a type:
//!
//! 1. built-in descriptors for primitives, paths, timestamps and enums
//! 2. custom descriptors registered by the application
//! 3. structural fallbacks for any type with a `FromStr` implementation

use std::fmt::Display;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use cmdpipe_core::ValueType;

use crate::culture::Culture;
use crate::value::{CustomValue, Value};

/// Converts raw text into [`Value`]s of the types it supports.
pub trait TypeDescriptor: Send + Sync {
    /// Whether this descriptor handles `value_type`.
    fn can_support(&self, value_type: &ValueType) -> bool;

    /// Converts `raw`; the error is a short reason shown to the user.
    fn parse(&self, value_type: &ValueType, raw: &str, culture: &Culture)
    -> Result<Value, String>;

    /// Placeholder shown in usage text, e.g. `NUMBER`.
    fn display_name(&self, value_type: &ValueType) -> String;
}

#[derive(Debug, Clone, Copy)]
struct BoolDescriptor;

impl TypeDescriptor for BoolDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Bool)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err("expected true or false".to_string()),
        }
    }

    fn display_name(&self, _: &ValueType) -> String {
        "BOOL".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct TextDescriptor;

impl TypeDescriptor for TextDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::String)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        Ok(Value::Text(raw.to_string()))
    }

    fn display_name(&self, _: &ValueType) -> String {
        "TEXT".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct IntegerDescriptor;

impl TypeDescriptor for IntegerDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Integer)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        raw.parse::<i64>()
            .map(Value::Integer)
            .map_err(|err| err.to_string())
    }

    fn display_name(&self, _: &ValueType) -> String {
        "NUMBER".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatDescriptor;

impl TypeDescriptor for FloatDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Float)
    }

    fn parse(&self, _: &ValueType, raw: &str, culture: &Culture) -> Result<Value, String> {
        let separator = culture.decimal_separator();
        let other = if separator == '.' { ',' } else { '.' };
        if raw.contains(other) {
            return Err(format!(
                "culture {culture} uses '{separator}' as the decimal separator"
            ));
        }
        raw.replace(separator, ".")
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|err| err.to_string())
    }

    fn display_name(&self, _: &ValueType) -> String {
        "DECIMAL".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct CharDescriptor;

impl TypeDescriptor for CharDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Char)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Char(c)),
            _ => Err("expected exactly one character".to_string()),
        }
    }

    fn display_name(&self, _: &ValueType) -> String {
        "CHAR".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct PathDescriptor;

impl TypeDescriptor for PathDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Path)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        if raw.is_empty() {
            return Err("path is empty".to_string());
        }
        Ok(Value::Path(PathBuf::from(raw)))
    }

    fn display_name(&self, _: &ValueType) -> String {
        "PATH".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct DateTimeDescriptor;

impl TypeDescriptor for DateTimeDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::DateTime)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Value::DateTime(stamp));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| Value::DateTime(midnight.and_utc().fixed_offset()))
            .ok_or_else(|| "expected RFC 3339 or YYYY-MM-DD".to_string())
    }

    fn display_name(&self, _: &ValueType) -> String {
        "DATETIME".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct EnumDescriptor;

impl TypeDescriptor for EnumDescriptor {
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Enum(_))
    }

    fn parse(&self, value_type: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        let ValueType::Enum(names) = value_type else {
            return Err("not an enum type".to_string());
        };
        names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(raw))
            .map(|name| Value::Enum(name.clone()))
            .ok_or_else(|| format!("expected one of: {}", names.join(", ")))
    }

    fn display_name(&self, value_type: &ValueType) -> String {
        match value_type {
            ValueType::Enum(names) => names.join("|"),
            _ => "VALUE".to_string(),
        }
    }
}

/// Structural descriptor for a named custom type parsed with `FromStr`.
pub struct FromStrDescriptor<T> {
    type_name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FromStrDescriptor<T> {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<T> TypeDescriptor for FromStrDescriptor<T>
where
    T: FromStr + Display + Send + Sync + 'static,
    T::Err: Display,
{
    fn can_support(&self, value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Custom(name) if *name == self.type_name)
    }

    fn parse(&self, _: &ValueType, raw: &str, _: &Culture) -> Result<Value, String> {
        raw.parse::<T>()
            .map(|parsed| Value::Custom(CustomValue::new(&self.type_name, parsed)))
            .map_err(|err| err.to_string())
    }

    fn display_name(&self, _: &ValueType) -> String {
        self.type_name.to_uppercase()
    }
}

/// Ordered descriptor lookup.
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
/// use cmdpipe_core::ValueType;
/// use cmdpipe_runtime::{Culture, TypeRegistry, Value};
///
/// let mut registry = TypeRegistry::new();
/// registry.register_from_str::<Ipv4Addr>("ipv4");
///
/// let culture = Culture::default();
/// let ip = registry.parse(&ValueType::Custom("ipv4".into()), "10.0.0.1", &culture).unwrap();
/// assert_eq!(ip.downcast_ref::<Ipv4Addr>(), Some(&Ipv4Addr::new(10, 0, 0, 1)));
///
/// let n = registry.parse(&ValueType::Integer, "42", &culture).unwrap();
/// assert_eq!(n, Value::Integer(42));
/// assert!(!registry.supports(&ValueType::Custom("uuid".into())));
/// ```
#[derive(Clone)]
pub struct TypeRegistry {
    builtin: Vec<Arc<dyn TypeDescriptor>>,
    custom: Vec<Arc<dyn TypeDescriptor>>,
    fallback: Vec<Arc<dyn TypeDescriptor>>,
}

impl TypeRegistry {
    /// Registry with the built-in tier populated.
    pub fn new() -> Self {
        Self {
            builtin: vec![
                Arc::new(BoolDescriptor),
                Arc::new(TextDescriptor),
                Arc::new(IntegerDescriptor),
                Arc::new(FloatDescriptor),
                Arc::new(CharDescriptor),
                Arc::new(PathDescriptor),
                Arc::new(DateTimeDescriptor),
                Arc::new(EnumDescriptor),
            ],
            custom: Vec::new(),
            fallback: Vec::new(),
        }
    }

    /// Adds a descriptor to the custom tier. Earlier registrations win.
    pub fn register(&mut self, descriptor: impl TypeDescriptor + 'static) {
        self.custom.push(Arc::new(descriptor));
    }

    /// Adds a `FromStr` fallback for `ValueType::Custom(type_name)`.
    pub fn register_from_str<T>(&mut self, type_name: &str)
    where
        T: FromStr + Display + Send + Sync + 'static,
        T::Err: Display,
    {
        self.fallback
            .push(Arc::new(FromStrDescriptor::<T>::new(type_name)));
    }

    /// First descriptor supporting `value_type`.
    pub fn find(&self, value_type: &ValueType) -> Option<&dyn TypeDescriptor> {
        self.builtin
            .iter()
            .chain(&self.custom)
            .chain(&self.fallback)
            .find(|d| d.can_support(value_type))
            .map(|d| d.as_ref())
    }

    pub fn supports(&self, value_type: &ValueType) -> bool {
        self.find(value_type).is_some()
    }

    /// Converts `raw` with the first supporting descriptor.
    pub fn parse(
        &self,
        value_type: &ValueType,
        raw: &str,
        culture: &Culture,
    ) -> Result<Value, String> {
        match self.find(value_type) {
            Some(descriptor) => descriptor.parse(value_type, raw, culture),
            None => Err(format!("no descriptor supports {value_type:?}")),
        }
    }

    /// Usage placeholder for `value_type`.
    pub fn display_name(&self, value_type: &ValueType) -> String {
        match self.find(value_type) {
            Some(descriptor) => descriptor.display_name(value_type),
            None => "VALUE".to_string(),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("builtin", &self.builtin.len())
            .field("custom", &self.custom.len())
            .field("fallback", &self.fallback.len())
            .finish()
    }
}
