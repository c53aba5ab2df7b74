//! Bridge between caller-supplied native types and the backend's
//! attribute-value wire format.
//!
//! Both directions are pure functions over `serde`; failures are wrapped in
//! [`StoreError::Marshal`] and never retried.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

use crate::core::{Item, Result, StoreError, Value};

/// Converts a serializable record into a wire [`Item`].
///
/// The top-level value must serialize to a map; scalars and sequences have
/// no attribute names to key on.
pub fn marshal<T: Serialize>(record: &T) -> Result<Item> {
    let json = serde_json::to_value(record)
        .map_err(|err| StoreError::Marshal(format!("serialize: {err}")))?;
    match json {
        Json::Object(map) => Ok(map
            .into_iter()
            .map(|(name, value)| (name, json_to_value(value)))
            .collect()),
        other => Err(StoreError::Marshal(format!(
            "record must serialize to a map, got {other}"
        ))),
    }
}

/// Converts a wire [`Item`] back into a caller type.
pub fn unmarshal<T: DeserializeOwned>(item: &Item) -> Result<T> {
    let mut map = serde_json::Map::with_capacity(item.len());
    for (name, value) in item {
        map.insert(name.clone(), value_to_json(value)?);
    }
    serde_json::from_value(Json::Object(map))
        .map_err(|err| StoreError::Marshal(format!("deserialize: {err}")))
}

fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(n.to_string()),
        Json::String(s) => Value::Text(s),
        Json::Array(items) => Value::List(items.into_iter().map(json_to_value).collect()),
        Json::Object(map) => Value::Map(
            map.into_iter()
                .map(|(name, value)| (name, json_to_value(value)))
                .collect(),
        ),
    }
}

fn value_to_json(value: &Value) -> Result<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(parse_number(n)?),
        Value::Text(s) => Json::String(s.clone()),
        Value::Binary(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (name, value) in map {
                out.insert(name.clone(), value_to_json(value)?);
            }
            Json::Object(out)
        }
        Value::StringSet(items) => {
            Json::Array(items.iter().map(|s| Json::String(s.clone())).collect())
        }
        Value::NumberSet(items) => Json::Array(
            items
                .iter()
                .map(|n| parse_number(n).map(Json::Number))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::BinarySet(items) => Json::Array(
            items
                .iter()
                .map(|bytes| Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()))
                .collect(),
        ),
    };
    Ok(json)
}

fn parse_number(repr: &str) -> Result<serde_json::Number> {
    serde_json::from_str(repr)
        .map_err(|_| StoreError::Marshal(format!("invalid number literal: {repr}")))
}
