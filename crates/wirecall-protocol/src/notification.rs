use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::request::{deserialize_params, RequestParams};
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification: a request without an `id`. Fire-and-forget; the
/// peer never answers it, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "deserialize_params"
    )]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2,
            method: method.into(),
            params,
        }
    }

    pub fn with_positional(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(method, Some(RequestParams::Array(params)))
    }

    pub fn with_named(method: impl Into<String>, params: HashMap<String, Value>) -> Self {
        Self::new(method, Some(RequestParams::Object(params)))
    }
}
