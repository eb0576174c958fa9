//! Reflection traits and their implementations for standard types.
//!
//! A type takes part in structural conversion by implementing three traits:
//!
//! - [`Typed`]: describes its shape as a [`TypeInfo`].
//! - [`Reflect`]: renders an instance as a [`Value`].
//! - [`FromValue`]: materialises an instance from a value that already has
//!   the described shape.
//!
//! `FromValue` is intentionally strict: it only accepts values that conform
//! to the type. Loosely-typed input must go through
//! [`convert_value`](crate::convert::convert_value) first, which is what
//! [`convert_into`](crate::convert::convert_into) does.
//!
//! Records get all three from `#[derive(Reflect)]`:
//!
//! ```rust,ignore
//! #[derive(Debug, Default, Reflect)]
//! pub struct User {
//!     pub name: String,
//!     #[reflect(private)]
//!     age: u32,
//!     #[reflect(skip)]
//!     cache: Vec<u8>,
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConvertError, ConvertResult};
use crate::types::{FieldInfo, FloatKind, IntKind, RecordInfo, TypeInfo, UIntKind};
use crate::value::{Mapping, Record, Value};

/// Static shape description of a type.
pub trait Typed {
    fn type_info() -> TypeInfo;
}

/// Renders an instance as a loosely-typed [`Value`].
pub trait Reflect {
    fn to_value(&self) -> Value;
}

/// Materialises an instance from a conforming [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> ConvertResult<Self>;
}

/// Binary payload, reflected as [`TypeInfo::Bytes`] rather than a sequence of
/// integers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

// ─── Derive support ───────────────────────────────────────────────────────────

/// Extracts the field table of a record-shaped value.
///
/// Mappings are accepted as well so that values decoded from JSON can be
/// materialised without another conversion pass.
#[doc(hidden)]
pub fn record_fields(value: Value, target: fn() -> TypeInfo) -> ConvertResult<Mapping> {
    match value {
        Value::Record(record) => Ok(record.into_fields()),
        Value::Map(map) => Ok(map),
        other => Err(ConvertError::unconvertible(&other, &target())),
    }
}

/// Removes and materialises one field from a record's field table.
#[doc(hidden)]
pub fn take_field<T: FromValue>(fields: &mut Mapping, name: &str) -> ConvertResult<T> {
    T::from_value(fields.remove(name).unwrap_or_default()).map_err(|e| e.in_field(name))
}

// ─── Scalars ──────────────────────────────────────────────────────────────────

macro_rules! reflect_signed {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Typed for $t {
            fn type_info() -> TypeInfo {
                TypeInfo::Int(IntKind::$kind)
            }
        }

        impl Reflect for $t {
            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }
        }

        impl FromValue for $t {
            fn from_value(value: Value) -> ConvertResult<Self> {
                let converted = match &value {
                    Value::Int(n) => <$t>::try_from(*n).ok(),
                    Value::UInt(n) => <$t>::try_from(*n).ok(),
                    _ => return Err(ConvertError::unconvertible(&value, &Self::type_info())),
                };
                converted.ok_or_else(|| ConvertError::out_of_range(&value, &Self::type_info()))
            }
        }
    )*};
}

macro_rules! reflect_unsigned {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Typed for $t {
            fn type_info() -> TypeInfo {
                TypeInfo::UInt(UIntKind::$kind)
            }
        }

        impl Reflect for $t {
            fn to_value(&self) -> Value {
                Value::UInt(*self as u64)
            }
        }

        impl FromValue for $t {
            fn from_value(value: Value) -> ConvertResult<Self> {
                let converted = match &value {
                    Value::Int(n) => <$t>::try_from(*n).ok(),
                    Value::UInt(n) => <$t>::try_from(*n).ok(),
                    _ => return Err(ConvertError::unconvertible(&value, &Self::type_info())),
                };
                converted.ok_or_else(|| ConvertError::out_of_range(&value, &Self::type_info()))
            }
        }
    )*};
}

reflect_signed!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
reflect_unsigned!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);

macro_rules! reflect_float {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Typed for $t {
            fn type_info() -> TypeInfo {
                TypeInfo::Float(FloatKind::$kind)
            }
        }

        impl Reflect for $t {
            fn to_value(&self) -> Value {
                Value::Float(f64::from(*self))
            }
        }

        impl FromValue for $t {
            fn from_value(value: Value) -> ConvertResult<Self> {
                value
                    .as_f64()
                    .map(|f| f as $t)
                    .ok_or_else(|| ConvertError::unconvertible(&value, &Self::type_info()))
            }
        }
    )*};
}

reflect_float!(f32 => F32, f64 => F64);

impl Typed for bool {
    fn type_info() -> TypeInfo {
        TypeInfo::Bool
    }
}

impl Reflect for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> ConvertResult<Self> {
        value
            .as_bool()
            .ok_or_else(|| ConvertError::unconvertible(&value, &TypeInfo::Bool))
    }
}

impl Typed for String {
    fn type_info() -> TypeInfo {
        TypeInfo::Str
    }
}

impl Reflect for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl Reflect for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> ConvertResult<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(ConvertError::unconvertible(&other, &TypeInfo::Str)),
        }
    }
}

impl Typed for Bytes {
    fn type_info() -> TypeInfo {
        TypeInfo::Bytes
    }
}

impl Reflect for Bytes {
    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> ConvertResult<Self> {
        match value {
            Value::Bytes(bytes) => Ok(Self(bytes)),
            other => Err(ConvertError::unconvertible(&other, &TypeInfo::Bytes)),
        }
    }
}

impl Typed for Value {
    fn type_info() -> TypeInfo {
        TypeInfo::Any
    }
}

impl Reflect for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> ConvertResult<Self> {
        Ok(value)
    }
}

// ─── Wrappers ─────────────────────────────────────────────────────────────────

impl<T: Reflect + ?Sized> Reflect for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: Typed> Typed for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::Option(Box::new(T::type_info()))
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Reflect::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ConvertResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! reflect_pointer {
    ($($ptr:ident),*) => {$(
        impl<T: Typed> Typed for $ptr<T> {
            fn type_info() -> TypeInfo {
                TypeInfo::Pointer(Box::new(T::type_info()))
            }
        }

        impl<T: Reflect + ?Sized> Reflect for $ptr<T> {
            fn to_value(&self) -> Value {
                (**self).to_value()
            }
        }

        impl<T: FromValue> FromValue for $ptr<T> {
            fn from_value(value: Value) -> ConvertResult<Self> {
                T::from_value(value).map($ptr::new)
            }
        }
    )*};
}

reflect_pointer!(Box, Arc);

// ─── Containers ───────────────────────────────────────────────────────────────

fn seq_items(value: Value, target: fn() -> TypeInfo) -> ConvertResult<Vec<Value>> {
    match value {
        Value::Seq(items) => Ok(items),
        other => Err(ConvertError::unconvertible(&other, &target())),
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::Seq(Box::new(T::type_info()))
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Reflect::to_value).collect())
    }
}

impl<T: Reflect> Reflect for [T] {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Reflect::to_value).collect())
    }
}

impl<T: Typed + FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> ConvertResult<Self> {
        seq_items(value, Self::type_info)?
            .into_iter()
            .enumerate()
            .map(|(index, item)| T::from_value(item).map_err(|e| e.at_element(index)))
            .collect()
    }
}

impl<T: Typed, const N: usize> Typed for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::Array(Box::new(T::type_info()), N)
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Reflect::to_value).collect())
    }
}

impl<T: Typed + FromValue, const N: usize> FromValue for [T; N] {
    fn from_value(value: Value) -> ConvertResult<Self> {
        let items = seq_items(value, Self::type_info)?;
        if items.len() != N {
            return Err(ConvertError::out_of_range(
                format!("sequence of length {}", items.len()),
                &Self::type_info(),
            ));
        }
        let elements = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| T::from_value(item).map_err(|e| e.at_element(index)))
            .collect::<ConvertResult<Vec<T>>>()?;
        elements.try_into().map_err(|rest: Vec<T>| {
            ConvertError::out_of_range(format!("sequence of length {}", rest.len()), &Self::type_info())
        })
    }
}

macro_rules! reflect_string_map {
    ($($map:ident),*) => {$(
        impl<T: Typed> Typed for $map<String, T> {
            fn type_info() -> TypeInfo {
                TypeInfo::Map(Box::new(T::type_info()))
            }
        }

        impl<T: Reflect> Reflect for $map<String, T> {
            fn to_value(&self) -> Value {
                let mut keys: Vec<&String> = self.keys().collect();
                keys.sort();
                Value::Map(keys.into_iter().map(|k| (k.clone(), self[k].to_value())).collect())
            }
        }

        impl<T: Typed + FromValue> FromValue for $map<String, T> {
            fn from_value(value: Value) -> ConvertResult<Self> {
                match value {
                    Value::Map(map) => map
                        .into_iter()
                        .map(|(k, v)| T::from_value(v).map_err(|e| e.in_field(k.clone())).map(|v| (k, v)))
                        .collect(),
                    other => Err(ConvertError::unconvertible(&other, &Self::type_info())),
                }
            }
        }
    )*};
}

reflect_string_map!(HashMap, BTreeMap);

// ─── Standard records ─────────────────────────────────────────────────────────

/// `Duration` is reflected as a record of the `core::time` package, which
/// keeps it out of injected symbol environments.
impl Typed for Duration {
    fn type_info() -> TypeInfo {
        TypeInfo::Record(RecordInfo::new(
            "core::time",
            "Duration",
            vec![
                FieldInfo::new("secs", true, u64::type_info),
                FieldInfo::new("nanos", true, u32::type_info),
            ],
        ))
    }
}

impl Reflect for Duration {
    fn to_value(&self) -> Value {
        Value::Record(
            Record::new("core::time", "Duration")
                .with_field("secs", self.as_secs())
                .with_field("nanos", self.subsec_nanos()),
        )
    }
}

impl FromValue for Duration {
    fn from_value(value: Value) -> ConvertResult<Self> {
        let mut fields = record_fields(value, Self::type_info)?;
        let secs: u64 = take_field(&mut fields, "secs")?;
        let nanos: u32 = take_field(&mut fields, "nanos")?;
        Ok(Duration::new(secs, nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_range_is_checked() {
        assert_eq!(u8::from_value(Value::Int(200)), Ok(200));
        assert!(matches!(
            u8::from_value(Value::Int(300)),
            Err(ConvertError::OutOfRange { .. })
        ));
        assert!(matches!(
            i32::from_value(Value::from("1")),
            Err(ConvertError::UnconvertibleType { .. })
        ));
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::from("x")),
            Ok(Some("x".to_string()))
        );
    }

    #[test]
    fn test_vec_reports_failing_element() {
        let err = Vec::<bool>::from_value(Value::Seq(vec![Value::Bool(true), Value::Int(1)]))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Element { index: 1, .. }));
    }

    #[test]
    fn test_array_requires_exact_length() {
        let value = Value::Seq(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(<[i64; 2]>::from_value(value.clone()), Ok([1, 2]));
        assert!(<[i64; 3]>::from_value(value).is_err());
    }

    #[test]
    fn test_hash_map_renders_sorted() {
        let map: HashMap<String, u32> = [("b".to_string(), 2), ("a".to_string(), 1)].into();
        let value = map.to_value();
        let keys: Vec<&str> = value.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_duration_is_a_core_record() {
        let info = Duration::type_info();
        assert_eq!(info.as_record().unwrap().package(), "core::time");

        let value = Duration::from_millis(1500).to_value();
        assert_eq!(Duration::from_value(value), Ok(Duration::from_millis(1500)));
    }
}
