//! Structural conversion engine.
//!
//! [`convert_value`] shapes a loosely-typed [`Value`] into the form described
//! by a [`TypeInfo`]. Rules are tried in order:
//!
//! 1. **Direct**: numeric conversions (range-checked), string passthrough,
//!    `Str` ↔ `Bytes`, records already of the target type.
//! 2. **Structural copy**: for composite values or targets:
//!    - record → record by exact field name, private (opted-in) fields included;
//!    - mapping → record by case-insensitive key, unmatched keys ignored;
//!    - sequence → sequence / fixed array element-wise (arrays truncate or pad);
//!    - record / mapping → mapping entry-wise.
//! 3. **JSON round-trip**: any composite shape the copy rules did not
//!    reconcile is rendered as JSON text (string and byte sources are taken as
//!    JSON text verbatim) and decoded against the target.
//!
//! Anything else fails with [`ConvertError::UnconvertibleType`].
//!
//! # Case-insensitive keys
//!
//! When several mapping keys fold to the same field name, the key that comes
//! **last in the mapping's insertion order** wins.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{ConvertError, ConvertResult};
use crate::reflect::{FromValue, Reflect, Typed};
use crate::types::{FloatKind, IntKind, RecordInfo, TypeInfo, UIntKind};
use crate::value::{Mapping, Value};

/// Shapes `value` into the form described by `target`.
pub fn convert_value(value: Value, target: &TypeInfo) -> ConvertResult<Value> {
    shape(value, None, target, true)
}

/// Converts `value` and materialises it as `T`.
pub fn convert_into<T: Typed + FromValue>(value: Value) -> ConvertResult<T> {
    let converted = convert_value(value, &T::type_info())?;
    T::from_value(converted)
}

/// Copies `src` onto `dst`.
///
/// Unlike [`convert_into`], the structural copy starts from the current
/// contents of `dst`: fields with no counterpart in `src` keep their values.
pub fn convert_to<S, D>(src: &S, dst: &mut D) -> ConvertResult<()>
where
    S: Reflect + ?Sized,
    D: Typed + Reflect + FromValue,
{
    let merged = shape(src.to_value(), Some(dst.to_value()), &D::type_info(), true)?;
    *dst = D::from_value(merged)?;
    Ok(())
}

// ─── Engine ───────────────────────────────────────────────────────────────────

fn shape(value: Value, base: Option<Value>, target: &TypeInfo, json: bool) -> ConvertResult<Value> {
    match target {
        TypeInfo::Any => return Ok(value),
        TypeInfo::Pointer(inner) => return shape(value, base, inner, json),
        TypeInfo::Option(inner) => {
            return match value {
                Value::Null => Ok(Value::Null),
                value => shape(value, base.filter(|b| !b.is_null()), inner, json),
            };
        }
        _ => {}
    }

    if value.is_null() {
        return Err(ConvertError::unconvertible(&value, target));
    }

    if let Some(converted) = direct(&value, target)? {
        return Ok(converted);
    }

    if !(value.is_composite() || target.is_composite()) {
        return Err(ConvertError::unconvertible(&value, target));
    }

    let source_type = value.describe();
    match structural(value, base, target, json)? {
        Shaped::Done(converted) => Ok(converted),
        Shaped::Unreconciled(value) if json => json_round_trip(value, target),
        Shaped::Unreconciled(_) => Err(ConvertError::UnconvertibleType {
            source_type,
            target_type: target.display_name(),
        }),
    }
}

fn direct(value: &Value, target: &TypeInfo) -> ConvertResult<Option<Value>> {
    let converted = match (value, target) {
        (Value::Bool(b), TypeInfo::Bool) => Value::Bool(*b),
        (Value::Int(n), TypeInfo::Int(kind)) => signed(i128::from(*n), *kind, target)?,
        (Value::UInt(n), TypeInfo::Int(kind)) => signed(i128::from(*n), *kind, target)?,
        (Value::Int(n), TypeInfo::UInt(kind)) => unsigned(i128::from(*n), *kind, target)?,
        (Value::UInt(n), TypeInfo::UInt(kind)) => unsigned(i128::from(*n), *kind, target)?,
        (Value::Int(n), TypeInfo::Float(kind)) => float(*n as f64, *kind),
        (Value::UInt(n), TypeInfo::Float(kind)) => float(*n as f64, *kind),
        (Value::Float(f), TypeInfo::Float(kind)) => float(*f, *kind),
        (Value::Float(f), TypeInfo::Int(kind)) => signed(truncate(*f, target)?, *kind, target)?,
        (Value::Float(f), TypeInfo::UInt(kind)) => unsigned(truncate(*f, target)?, *kind, target)?,
        (Value::Str(s), TypeInfo::Str) => Value::Str(s.clone()),
        (Value::Str(s), TypeInfo::Bytes) => Value::Bytes(s.clone().into_bytes()),
        (Value::Bytes(b), TypeInfo::Bytes) => Value::Bytes(b.clone()),
        (Value::Bytes(b), TypeInfo::Str) => match std::str::from_utf8(b) {
            Ok(s) => Value::Str(s.to_string()),
            Err(_) => return Ok(None),
        },
        (Value::Record(record), TypeInfo::Record(info)) if info.describes(record) => value.clone(),
        _ => return Ok(None),
    };
    Ok(Some(converted))
}

fn signed(n: i128, kind: IntKind, target: &TypeInfo) -> ConvertResult<Value> {
    let (min, max) = kind.bounds();
    if n < i128::from(min) || n > i128::from(max) {
        return Err(ConvertError::out_of_range(n, target));
    }
    Ok(Value::Int(n as i64))
}

fn unsigned(n: i128, kind: UIntKind, target: &TypeInfo) -> ConvertResult<Value> {
    if n < 0 || n > i128::from(kind.max()) {
        return Err(ConvertError::out_of_range(n, target));
    }
    Ok(Value::UInt(n as u64))
}

fn float(f: f64, kind: FloatKind) -> Value {
    match kind {
        FloatKind::F32 => Value::Float(f64::from(f as f32)),
        FloatKind::F64 => Value::Float(f),
    }
}

fn truncate(f: f64, target: &TypeInfo) -> ConvertResult<i128> {
    if !f.is_finite() || f.abs() >= 1e38 {
        return Err(ConvertError::out_of_range(f, target));
    }
    Ok(f.trunc() as i128)
}

// ─── Structural copy ──────────────────────────────────────────────────────────

enum Shaped {
    Done(Value),
    Unreconciled(Value),
}

fn structural(value: Value, base: Option<Value>, target: &TypeInfo, json: bool) -> ConvertResult<Shaped> {
    let copied = match (value, target.deref()) {
        (Value::Record(record), TypeInfo::Record(info)) => {
            fill_record(record.into_fields(), false, base, info, json)?
        }
        (Value::Map(map), TypeInfo::Record(info)) => fill_record(map, true, base, info, json)?,
        (Value::Seq(items), TypeInfo::Seq(elem)) => Value::Seq(elements(items, elem, json)?),
        (Value::Seq(items), TypeInfo::Array(elem, len)) => {
            let mut converted = elements(items.into_iter().take(*len).collect(), elem, json)?;
            converted.resize_with(*len, || elem.zero_value());
            Value::Seq(converted)
        }
        (Value::Seq(items), TypeInfo::Bytes) => {
            let bytes = elements(items, &TypeInfo::UInt(UIntKind::U8), json)?;
            Value::Bytes(bytes.iter().filter_map(Value::as_i64).map(|b| b as u8).collect())
        }
        (Value::Bytes(bytes), TypeInfo::Seq(elem)) => {
            Value::Seq(elements(bytes.into_iter().map(|b| Value::UInt(u64::from(b))).collect(), elem, json)?)
        }
        (Value::Map(map), TypeInfo::Map(elem)) => fill_map(map, base, elem, json)?,
        (Value::Record(record), TypeInfo::Map(elem)) => {
            fill_map(record.into_fields(), base, elem, json)?
        }
        (value, _) => return Ok(Shaped::Unreconciled(value)),
    };
    Ok(Shaped::Done(copied))
}

fn elements(items: Vec<Value>, elem: &TypeInfo, json: bool) -> ConvertResult<Vec<Value>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| shape(item, None, elem, json).map_err(|e| e.at_element(index)))
        .collect()
}

fn fill_record(
    entries: Mapping,
    fold_case: bool,
    base: Option<Value>,
    info: &RecordInfo,
    json: bool,
) -> ConvertResult<Value> {
    let mut record = match base {
        Some(Value::Record(record)) if info.describes(&record) => record,
        _ => info.zero_record(),
    };

    // Later keys overwrite earlier ones that fold to the same name.
    let mut lookup: HashMap<String, Value> = entries
        .into_iter()
        .map(|(key, value)| (if fold_case { key.to_lowercase() } else { key }, value))
        .collect();

    for field in info.fields() {
        let key = if fold_case {
            field.name().to_lowercase()
        } else {
            field.name().to_string()
        };
        let Some(value) = lookup.remove(&key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let current = record.field_mut(field.name()).map(std::mem::take);
        let converted = shape(value, current, &field.ty(), json).map_err(|e| e.in_field(field.name()))?;
        record.set_field(field.name(), converted);
    }

    if !lookup.is_empty() {
        trace!(
            record = %info.qualified_name(),
            ignored = lookup.len(),
            "Unmatched keys ignored during structural copy"
        );
    }

    Ok(Value::Record(record))
}

fn fill_map(entries: Mapping, base: Option<Value>, elem: &TypeInfo, json: bool) -> ConvertResult<Value> {
    let mut map = match base {
        Some(Value::Map(map)) => map,
        _ => Mapping::with_capacity(entries.len()),
    };
    for (key, value) in entries {
        let converted = shape(value, None, elem, json).map_err(|e| e.in_field(key.clone()))?;
        map.insert(key, converted);
    }
    Ok(Value::Map(map))
}

fn json_round_trip(value: Value, target: &TypeInfo) -> ConvertResult<Value> {
    let unconvertible = ConvertError::unconvertible(&value, target);
    let text = match value {
        Value::Str(text) => text,
        Value::Bytes(bytes) => String::from_utf8(bytes).map_err(|_| unconvertible.clone())?,
        other => other.to_json().to_string(),
    };
    let decoded: serde_json::Value = serde_json::from_str(&text).map_err(|_| unconvertible.clone())?;
    trace!(target_type = %target, "Falling back to JSON round-trip");
    shape(Value::from(decoded), None, target, false).map_err(|_| unconvertible)
}
