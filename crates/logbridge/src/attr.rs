//! Attributes and their typed values
//!
//! An [`Attr`] is a key plus a [`Value`]. Values form a closed set of kinds;
//! group values nest further attributes and lazy values defer their
//! computation until the attribute is actually projected into a sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of lazy resolutions followed before giving up
pub const MAX_LOG_VALUE_RESOLUTIONS: usize = 100;

/// A value computed on demand
///
/// Implemented for any `Fn() -> Value` closure.
pub trait LogValuer: Send + Sync {
    fn log_value(&self) -> Value;
}

impl<F> LogValuer for F
where
    F: Fn() -> Value + Send + Sync,
{
    fn log_value(&self) -> Value {
        self()
    }
}

/// Opaque value carried by [`Value::Any`]
#[derive(Clone)]
pub enum AnyValue {
    /// An error object, rendered through the sink's error convention
    Error(Arc<dyn std::error::Error + Send + Sync>),
    /// Any other value, captured in serialized form
    Json(serde_json::Value),
}

impl AnyValue {
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnyValue::Error(Arc::new(err))
    }

    /// Capture a serializable value.
    ///
    /// A value that fails to serialize is captured as the serializer's
    /// error message.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => AnyValue::Json(v),
            Err(e) => AnyValue::Json(serde_json::Value::String(e.to_string())),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnyValue::Error(_))
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyValue::Error(e) => f.debug_tuple("Error").field(&e.to_string()).finish(),
            AnyValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

/// Discriminant of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int64,
    Uint64,
    Float64,
    Duration,
    Time,
    String,
    Group,
    LogValuer,
    Any,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Bool => "Bool",
            Kind::Int64 => "Int64",
            Kind::Uint64 => "Uint64",
            Kind::Float64 => "Float64",
            Kind::Duration => "Duration",
            Kind::Time => "Time",
            Kind::String => "String",
            Kind::Group => "Group",
            Kind::LogValuer => "LogValuer",
            Kind::Any => "Any",
        };
        f.write_str(name)
    }
}

/// Typed attribute value
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Duration(Duration),
    Time(DateTime<Utc>),
    String(String),
    Group(Vec<Attr>),
    Lazy(Arc<dyn LogValuer>),
    Any(AnyValue),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int64(_) => Kind::Int64,
            Value::Uint64(_) => Kind::Uint64,
            Value::Float64(_) => Kind::Float64,
            Value::Duration(_) => Kind::Duration,
            Value::Time(_) => Kind::Time,
            Value::String(_) => Kind::String,
            Value::Group(_) => Kind::Group,
            Value::Lazy(_) => Kind::LogValuer,
            Value::Any(_) => Kind::Any,
        }
    }

    /// Whether this is the zero value of its kind.
    ///
    /// Times and lazy values are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Int64(i) => *i == 0,
            Value::Uint64(u) => *u == 0,
            Value::Float64(f) => *f == 0.0,
            Value::Duration(d) => d.is_zero(),
            Value::Time(_) => false,
            Value::String(s) => s.is_empty(),
            Value::Group(attrs) => attrs.is_empty(),
            Value::Lazy(_) => false,
            Value::Any(AnyValue::Json(v)) => v.is_null(),
            Value::Any(AnyValue::Error(_)) => false,
        }
    }

    /// Follow lazy values until a concrete value is reached.
    ///
    /// After [`MAX_LOG_VALUE_RESOLUTIONS`] steps the result is an error value
    /// describing the runaway chain.
    pub fn resolve(self) -> Value {
        let mut value = self;
        for _ in 0..MAX_LOG_VALUE_RESOLUTIONS {
            match value {
                Value::Lazy(valuer) => value = valuer.log_value(),
                resolved => return resolved,
            }
        }

        match value {
            Value::Lazy(_) => Value::Any(AnyValue::from_error(ResolveError)),
            resolved => resolved,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("LogValue called too many times on Value of type LogValuer")]
struct ResolveError;

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{:?}", v),
            Value::Int64(v) => write!(f, "{:?}", v),
            Value::Uint64(v) => write!(f, "{:?}u", v),
            Value::Float64(v) => write!(f, "{:?}", v),
            Value::Duration(v) => write!(f, "{:?}", v),
            Value::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Group(attrs) => f.debug_list().entries(attrs).finish(),
            Value::Lazy(_) => f.write_str("<lazy>"),
            Value::Any(v) => write!(f, "{:?}", v),
        }
    }
}

macro_rules! impl_from_value {
    ($($t:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

impl_from_value! {
    i8 => Int64 as i64,
    i16 => Int64 as i64,
    i32 => Int64 as i64,
    i64 => Int64 as i64,
    isize => Int64 as i64,
    u8 => Uint64 as u64,
    u16 => Uint64 as u64,
    u32 => Uint64 as u64,
    u64 => Uint64 as u64,
    usize => Uint64 as u64,
    f32 => Float64 as f64,
    f64 => Float64 as f64,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<Vec<Attr>> for Value {
    fn from(v: Vec<Attr>) -> Self {
        Value::Group(v)
    }
}

impl From<AnyValue> for Value {
    fn from(v: AnyValue) -> Self {
        Value::Any(v)
    }
}

/// A key and a typed value
#[derive(Clone, Debug)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Value::Int64(value))
    }

    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Self::new(key, Value::Uint64(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, Value::Float64(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, Value::Duration(value))
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(key, Value::Time(value))
    }

    /// A nested group of attributes under `key`
    ///
    /// An empty key inlines the members into the enclosing scope.
    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Attr>) -> Self {
        Self::new(key, Value::Group(attrs.into_iter().collect()))
    }

    /// A value computed only if the attribute is actually emitted
    pub fn lazy<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::new(key, Value::Lazy(Arc::new(f)))
    }

    pub fn any<T: Serialize + ?Sized>(key: impl Into<String>, value: &T) -> Self {
        Self::new(key, Value::Any(AnyValue::from_serialize(value)))
    }

    pub fn error<E>(key: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(key, Value::Any(AnyValue::from_error(err)))
    }

    /// Whether both key and value are zero; such attributes are never emitted.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.value.is_zero()
    }
}
