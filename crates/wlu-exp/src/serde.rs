use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use wlu_core::errors::WluError;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into JSON bytes with object keys in sorted order.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, WluError> {
    let value = serde_json::to_value(value).map_err(|err| WluError::serde("json_serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value))
        .map_err(|err| WluError::serde("json_write", err))?;
    Ok(bytes)
}

/// Converts a value into a JSON tree with sorted object keys.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, WluError> {
    serde_json::to_value(value)
        .map(canonicalize)
        .map_err(|err| WluError::serde("json_serialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, WluError> {
    serde_yaml::from_slice(data).map_err(|err| WluError::serde("yaml_deserialize", err))
}
