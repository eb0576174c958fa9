//! Dynamic value model.
//!
//! [`Value`] is the loosely-typed currency exchanged between the host, the
//! conversion engine and plugins. It is deliberately pointer-transparent: a
//! boxed or shared record is represented by the record itself, and the target
//! [`TypeInfo`](crate::TypeInfo) decides whether a pointer is materialised.
//!
//! Two composite shapes exist besides sequences:
//!
//! - [`Mapping`]: loosely-typed, string-keyed, insertion-ordered.
//! - [`Record`]: the reflected form of a concrete host type; it remembers the
//!   package (module path) and type name it was produced from.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::ser::{SerializeMap, SerializeSeq};

// ─── Value ────────────────────────────────────────────────────────────────────

/// A loosely-typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(Mapping),
    Record(Record),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for sequences, mappings and records.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Seq(_) | Self::Map(_) | Self::Record(_))
    }

    /// Short description of the value's shape, used in conversion errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".into(),
            Self::Bool(_) => "bool".into(),
            Self::Int(_) => "int".into(),
            Self::UInt(_) => "uint".into(),
            Self::Float(_) => "float".into(),
            Self::Str(_) => "string".into(),
            Self::Bytes(_) => "bytes".into(),
            Self::Seq(_) => "sequence".into(),
            Self::Map(_) => "mapping".into(),
            Self::Record(record) => record.qualified_name(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            Self::UInt(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Looks up a named attribute on a mapping or record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            Self::Record(record) => record.field(key),
            _ => None,
        }
    }

    /// Renders the value as JSON.
    ///
    /// Records become objects of their fields, bytes become arrays of numbers
    /// and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(n) => Json::from(*n),
            Self::UInt(n) => Json::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Str(s) => Json::String(s.clone()),
            Self::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Self::Seq(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Self::Record(record) => Json::Object(
                record
                    .fields()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::Seq(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(v as $cast)
                }
            }
        )*
    };
}

value_from! {
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f64 => Float as f64,
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Seq(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Self::Map(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::UInt(n) => serializer.serialize_u64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bytes(bytes) => serializer.serialize_bytes(bytes),
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => serialize_entries(serializer, map),
            Self::Record(record) => serialize_entries(serializer, record.fields()),
        }
    }
}

fn serialize_entries<S: Serializer>(serializer: S, entries: &Mapping) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

// ─── Mapping ──────────────────────────────────────────────────────────────────

/// An insertion-ordered, string-keyed map.
///
/// Inserting an existing key replaces its value in place, keeping the original
/// position. Equality ignores ordering.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts `value` under `key`, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>> Extend<(K, Value)> for Mapping {
    fn extend<I: IntoIterator<Item = (K, Value)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = (&'a str, &'a Value);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, Value)>,
        fn(&'a (String, Value)) -> (&'a str, &'a Value),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let split: fn(&'a (String, Value)) -> (&'a str, &'a Value) = |(k, v)| (k.as_str(), v);
        self.entries.iter().map(split)
    }
}

// ─── Record ───────────────────────────────────────────────────────────────────

/// The reflected form of a concrete host type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    package: &'static str,
    type_name: &'static str,
    fields: Mapping,
}

impl Record {
    /// Creates an empty record for the type `type_name` in `package`.
    pub fn new(package: &'static str, type_name: &'static str) -> Self {
        Self {
            package,
            type_name,
            fields: Mapping::new(),
        }
    }

    /// Appends (or replaces) a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Originating package (the module path of the type).
    pub fn package(&self) -> &'static str {
        self.package
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `package::TypeName`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.package, self.type_name)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Replaces the field's value, keeping its position.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name, value);
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    pub fn into_fields(self) -> Mapping {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_insert_keeps_position() {
        let mut map = Mapping::new().with("a", 1).with("b", 2);
        let previous = map.insert("a", 3);

        assert_eq!(previous, Some(Value::Int(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_mapping_equality_ignores_order() {
        let left = Mapping::new().with("a", 1).with("b", "x");
        let right = Mapping::new().with("b", "x").with("a", 1);
        assert_eq!(left, right);
        assert_ne!(left, Mapping::new().with("a", 1));
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"name": "x", "tags": [1, 2], "ratio": 0.5, "big": u64::MAX});
        let value = Value::from(json.clone());

        assert_eq!(value.get("name"), Some(&Value::from("x")));
        assert_eq!(value.get("big"), Some(&Value::UInt(u64::MAX)));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_record_renders_as_object() {
        let record = Record::new("app::models", "User")
            .with_field("name", "alice")
            .with_field("age", 30);

        assert_eq!(record.qualified_name(), "app::models::User");
        assert_eq!(
            Value::Record(record).to_json(),
            serde_json::json!({"name": "alice", "age": 30})
        );
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let value = Value::from(Mapping::new().with("a", vec![Value::Null, Value::from(true)]));
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"a":[null,true]}"#);

        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }
}
