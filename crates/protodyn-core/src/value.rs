//! The dynamic value tree produced by decoding and consumed by encoding.
//!
//! A decoded message is a [`Record`]: a map from field name to [`Value`].
//! Fields absent from the wire are simply missing keys; there is no explicit
//! "unset" entry.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// A decoded message: field name to value, absent fields omitted
pub type Record = BTreeMap<String, Value>;

/// A dynamically-typed protobuf value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32` and enum numbers
    I32(i32),
    /// `int64`, `sint64`, `sfixed64`
    I64(i64),
    /// `uint32`, `fixed32`
    U32(u32),
    /// `uint64`, `fixed64`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`
    F64(f64),
    /// `string`, and `bytes` fields as base64 text
    String(String),
    /// Raw `bytes`, accepted on encode
    Bytes(Bytes),
    /// A repeated field
    List(Vec<Value>),
    /// A map field
    Map(BTreeMap<MapKey, Value>),
    /// An embedded message
    Message(Record),
}

/// A map key: the scalar subset protobuf allows as map keys
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// `bool` key
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32` key or enum number
    I32(i32),
    /// `int64`, `sint64`, `sfixed64` key
    I64(i64),
    /// `uint32`, `fixed32` key
    U32(u32),
    /// `uint64`, `fixed64` key
    U64(u64),
    /// `string` key
    String(String),
}

impl Value {
    /// Short variant name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Message(_) => "message",
        }
    }

    /// Returns the value as a bool, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as an `i32`, if it is one
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::I32(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the value as a `u32`, if it is one
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::U32(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the value as a `u64`, if it is one
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements of a repeated field
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the entries of a map field
    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the fields of an embedded message
    pub fn as_message(&self) -> Option<&Record> {
        match self {
            Value::Message(record) => Some(record),
            _ => None,
        }
    }
}

impl MapKey {
    /// Short variant name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            MapKey::Bool(_) => "bool",
            MapKey::I32(_) => "i32",
            MapKey::I64(_) => "i64",
            MapKey::U32(_) => "u32",
            MapKey::U64(_) => "u64",
            MapKey::String(_) => "string",
        }
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::I32(n) => Value::I32(n),
            MapKey::I64(n) => Value::I64(n),
            MapKey::U32(n) => Value::U32(n),
            MapKey::U64(n) => Value::U64(n),
            MapKey::String(s) => Value::String(s),
        }
    }
}

impl TryFrom<Value> for MapKey {
    type Error = Value;

    /// Fails with the input value when it has no key form
    fn try_from(value: Value) -> Result<Self, Value> {
        match value {
            Value::Bool(b) => Ok(MapKey::Bool(b)),
            Value::I32(n) => Ok(MapKey::I32(n)),
            Value::I64(n) => Ok(MapKey::I64(n)),
            Value::U32(n) => Ok(MapKey::U32(n)),
            Value::U64(n) => Ok(MapKey::U64(n)),
            Value::String(s) => Ok(MapKey::String(s)),
            other => Err(other),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::I32(n) => write!(f, "{}", n),
            MapKey::I64(n) => write!(f, "{}", n),
            MapKey::U32(n) => write!(f, "{}", n),
            MapKey::U64(n) => write!(f, "{}", n),
            MapKey::String(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Bytes => Bytes,
    Vec<Value> => List,
    Record => Message,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<BTreeMap<MapKey, Value>> for Value {
    fn from(value: BTreeMap<MapKey, Value>) -> Self {
        Value::Map(value)
    }
}

#[cfg(feature = "json")]
mod json {
    //! Conversion to and from `serde_json` values.

    use super::{Record, Value};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{Map, Number, Value as JsonValue};

    impl Value {
        /// Renders the value as JSON.
        ///
        /// Map keys become object member names; raw bytes become base64.
        pub fn to_json(&self) -> JsonValue {
            match self {
                Value::Bool(b) => JsonValue::Bool(*b),
                Value::I32(n) => JsonValue::from(*n),
                Value::I64(n) => JsonValue::from(*n),
                Value::U32(n) => JsonValue::from(*n),
                Value::U64(n) => JsonValue::from(*n),
                Value::F32(n) => float_to_json(f64::from(*n)),
                Value::F64(n) => float_to_json(*n),
                Value::String(s) => JsonValue::String(s.clone()),
                Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
                Value::List(values) => values.iter().map(Value::to_json).collect(),
                Value::Map(map) => JsonValue::Object(
                    map.iter()
                        .map(|(k, v)| (k.to_string(), v.to_json()))
                        .collect(),
                ),
                Value::Message(record) => record_to_json(record),
            }
        }

        /// Builds a value tree from JSON.
        ///
        /// Objects become records (map fields accept them on encode), and
        /// `null` yields `None` so callers can treat the member as absent.
        pub fn from_json(json: &JsonValue) -> Option<Value> {
            Some(match json {
                JsonValue::Null => return None,
                JsonValue::Bool(b) => Value::Bool(*b),
                JsonValue::Number(n) => number_to_value(n),
                JsonValue::String(s) => Value::String(s.clone()),
                JsonValue::Array(items) => {
                    Value::List(items.iter().filter_map(Value::from_json).collect())
                }
                JsonValue::Object(members) => Value::Message(
                    members
                        .iter()
                        .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                        .collect(),
                ),
            })
        }
    }

    /// Renders a record as a JSON object
    pub fn record_to_json(record: &Record) -> JsonValue {
        JsonValue::Object(
            record
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<_, _>>(),
        )
    }

    fn float_to_json(n: f64) -> JsonValue {
        match Number::from_f64(n) {
            Some(number) => JsonValue::Number(number),
            None if n.is_nan() => JsonValue::String("NaN".to_string()),
            None if n > 0.0 => JsonValue::String("Infinity".to_string()),
            None => JsonValue::String("-Infinity".to_string()),
        }
    }

    fn number_to_value(n: &Number) -> Value {
        if let Some(i) = n.as_i64() {
            Value::I64(i)
        } else if let Some(u) = n.as_u64() {
            Value::U64(u)
        } else {
            Value::F64(n.as_f64().unwrap_or(f64::NAN))
        }
    }

}

#[cfg(feature = "json")]
pub use json::record_to_json;
