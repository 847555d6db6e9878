use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters of a request or notification.
///
/// The `Null` variant exists so that `"params": null` survives a round-trip
/// as written. Omitted params are modeled as `Option::None` on the carrying
/// message, never as `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters.
    Array(Vec<Value>),
    /// Named parameters.
    Object(HashMap<String, Value>),
    /// Explicit `params: null`.
    Null,
}

impl RequestParams {
    /// Look up a named parameter. Returns `None` for positional params.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(name),
            _ => None,
        }
    }

    /// Look up a positional parameter. Returns `None` for named params.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(values) => values.get(index),
            _ => None,
        }
    }

    /// True for `Null`, an empty array, or an empty object.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestParams::Array(values) => values.is_empty(),
            RequestParams::Object(map) => map.is_empty(),
            RequestParams::Null => true,
        }
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(values: Vec<Value>) -> Self {
        RequestParams::Array(values)
    }
}

impl From<HashMap<String, Value>> for RequestParams {
    fn from(map: HashMap<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

/// Field deserializer that keeps `"params": null` distinct from an omitted
/// member. Serde's `Option` handling would otherwise fold null into `None`;
/// this runs only when the key is present, so null maps to the explicit
/// `Null` variant. Pair it with `#[serde(default)]` for the omitted case.
pub(crate) fn deserialize_params<'de, D>(
    deserializer: D,
) -> Result<Option<RequestParams>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Some(RequestParams::Null)),
        Value::Array(values) => Ok(Some(RequestParams::Array(values))),
        Value::Object(map) => Ok(Some(RequestParams::Object(map.into_iter().collect()))),
        _ => Err(serde::de::Error::custom(
            "params must be an array, an object, or null",
        )),
    }
}

/// A JSON-RPC request: a call that expects a response correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "deserialize_params"
    )]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2,
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Request with positional parameters.
    pub fn with_positional(id: impl Into<RequestId>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(id, method, Some(RequestParams::Array(params)))
    }

    /// Request with named parameters.
    pub fn with_named(
        id: impl Into<RequestId>,
        method: impl Into<String>,
        params: HashMap<String, Value>,
    ) -> Self {
        Self::new(id, method, Some(RequestParams::Object(params)))
    }
}
