//! Utility handle exposed to plugins.

use plugify_core::{
    ConvertResult, FromValue, InvokeResult, Mapping, TypeInfo, Typed, Value, convert_into,
    convert_value,
};

use crate::component::Service;

/// Package reported for the util handle in component listings.
pub const UTIL_PACKAGE: &str = module_path!();

/// Conversion and dispatch helpers, available to native plugins through
/// [`PluginComponents`](crate::component::PluginComponents) and to scripts as
/// `plugify::Util`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Util;

impl Util {
    /// Calls a reflected method on a host service.
    pub fn call_method(
        &self,
        service: &dyn Service,
        method: &str,
        args: Vec<Value>,
    ) -> InvokeResult<Vec<Value>> {
        service.call(method, args)
    }

    /// Shapes `value` into the form described by `target`.
    pub fn convert_to(&self, value: Value, target: &TypeInfo) -> ConvertResult<Value> {
        convert_value(value, target)
    }

    /// Shapes `value` into a `T`.
    pub fn convert_into<T: Typed + FromValue>(&self, value: Value) -> ConvertResult<T> {
        convert_into(value)
    }

    pub fn to_json(&self, value: &Value) -> String {
        value.to_json().to_string()
    }

    pub fn from_json(&self, text: &str) -> serde_json::Result<Value> {
        serde_json::from_str(text)
    }

    /// Looks up a field of a record or an entry of a mapping.
    ///
    /// An exact match wins over a case-insensitive one.
    pub fn get_attr(&self, value: &Value, name: &str) -> Option<Value> {
        if let Some(found) = value.get(name) {
            return Some(found.clone());
        }
        let entries = match value {
            Value::Map(map) => map,
            Value::Record(record) => record.fields(),
            _ => return None,
        };
        entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, found)| found.clone())
    }

    /// Converts a record (or mapping) into a plain mapping.
    pub fn to_map(&self, value: Value) -> ConvertResult<Mapping> {
        match convert_value(value, &TypeInfo::Map(Box::new(TypeInfo::Any)))? {
            Value::Map(map) => Ok(map),
            _ => Ok(Mapping::new()),
        }
    }

    /// Converts a sequence of records into plain mappings.
    pub fn to_maps(&self, value: Value) -> ConvertResult<Vec<Mapping>> {
        convert_into::<Vec<std::collections::BTreeMap<String, Value>>>(value).map(|maps| {
            maps.into_iter()
                .map(|map| map.into_iter().collect())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugify_core::Record;

    fn user() -> Value {
        Value::Record(
            Record::new("app::models", "User")
                .with_field("Name", "ada")
                .with_field("age", 36),
        )
    }

    #[test]
    fn test_get_attr() {
        let util = Util;
        assert_eq!(util.get_attr(&user(), "age"), Some(Value::Int(36)));
        assert_eq!(util.get_attr(&user(), "name"), Some(Value::from("ada")));
        assert_eq!(util.get_attr(&user(), "missing"), None);
        assert_eq!(util.get_attr(&Value::Int(1), "x"), None);
    }

    #[test]
    fn test_json_helpers() {
        let util = Util;
        let value = util.from_json(r#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(util.to_json(&value), r#"{"a":[1,2]}"#);
        assert!(util.from_json("{").is_err());
    }

    #[test]
    fn test_record_to_maps() {
        let util = Util;
        let map = util.to_map(user()).unwrap();
        assert_eq!(map.get("Name"), Some(&Value::from("ada")));

        let maps = util.to_maps(Value::Seq(vec![user(), user()])).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1].get("age"), Some(&Value::Int(36)));
    }
}
