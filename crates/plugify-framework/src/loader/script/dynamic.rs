//! Bridging between [`Value`] and Rhai's `Dynamic`.

use plugify_core::{Mapping, Value};
use rhai::{Array, Blob, Dynamic, ImmutableString, Map};

use super::handles::{ComponentHandle, TypeToken};

/// Records become object maps; the record identity is not preserved.
pub(crate) fn to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(b),
        Value::Int(i) => Dynamic::from_int(i),
        Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Dynamic::from_int(i),
            Err(_) => Dynamic::from_float(u as f64),
        },
        Value::Float(f) => Dynamic::from_float(f),
        Value::Str(s) => Dynamic::from(s),
        Value::Bytes(bytes) => Dynamic::from_blob(bytes),
        Value::Seq(items) => Dynamic::from_array(items.into_iter().map(to_dynamic).collect()),
        Value::Map(map) => Dynamic::from_map(to_object_map(map)),
        Value::Record(record) => Dynamic::from_map(to_object_map(record.into_fields())),
    }
}

fn to_object_map(map: Mapping) -> Map {
    map.into_iter()
        .map(|(key, value)| (key.into(), to_dynamic(value)))
        .collect()
}

/// Host handles are rendered as their current state; other opaque values
/// fall back to their display form.
pub(crate) fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::Int(i);
    }
    if let Ok(f) = value.as_float() {
        return Value::Float(f);
    }
    if let Ok(c) = value.as_char() {
        return Value::Str(c.to_string());
    }
    if value.is_string() {
        return match value.into_immutable_string() {
            Ok(s) => Value::Str(s.to_string()),
            Err(type_name) => Value::Str(type_name.to_string()),
        };
    }
    if value.is::<Blob>() {
        return Value::Bytes(value.cast::<Blob>());
    }
    if value.is::<Array>() {
        return Value::Seq(value.cast::<Array>().into_iter().map(from_dynamic).collect());
    }
    if value.is::<Map>() {
        return Value::Map(
            value
                .cast::<Map>()
                .into_iter()
                .map(|(key, value)| (key.to_string(), from_dynamic(value)))
                .collect(),
        );
    }
    if let Some(handle) = value.clone().try_cast::<ComponentHandle>() {
        return handle.snapshot();
    }
    if let Some(token) = value.clone().try_cast::<TypeToken>() {
        return token.zero_value();
    }
    Value::Str(value.to_string())
}

pub(crate) fn to_array(values: Vec<Value>) -> Array {
    values.into_iter().map(to_dynamic).collect()
}

pub(crate) fn string(s: impl Into<ImmutableString>) -> Dynamic {
    Dynamic::from(s.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugify_core::Record;

    #[test]
    fn test_scalars() {
        assert!(to_dynamic(Value::Null).is_unit());
        assert_eq!(to_dynamic(Value::Int(3)).as_int(), Ok(3));
        assert_eq!(to_dynamic(Value::UInt(u64::MAX)).as_float(), Ok(u64::MAX as f64));
        assert_eq!(from_dynamic(Dynamic::from_float(1.5)), Value::Float(1.5));
        assert_eq!(from_dynamic(Dynamic::from_char('x')), Value::from("x"));
        assert_eq!(from_dynamic(string("hi")), Value::from("hi"));
    }

    #[test]
    fn test_record_becomes_object_map() {
        let record = Record::new("app::models", "User")
            .with_field("name", "ada")
            .with_field("tags", Value::Seq(vec![Value::from("a")]));

        let back = from_dynamic(to_dynamic(Value::Record(record)));
        assert_eq!(
            back,
            Value::Map(
                Mapping::new()
                    .with("name", "ada")
                    .with("tags", Value::Seq(vec![Value::from("a")]))
            )
        );
    }

    #[test]
    fn test_bytes_stay_bytes() {
        let back = from_dynamic(to_dynamic(Value::Bytes(vec![1, 2])));
        assert_eq!(back, Value::Bytes(vec![1, 2]));
    }
}
