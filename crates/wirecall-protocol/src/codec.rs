//! Envelope codec: classifies a JSON text into the message variants and
//! serializes them back.
//!
//! Classification is by member presence (`method` vs `result`/`error`), the
//! way a framed peer must read an arbitrary inbound body. Unknown top-level
//! members are tolerated on decode and never re-emitted on encode.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ErrorObject;
use crate::notification::JsonRpcNotification;
use crate::request::{JsonRpcRequest, RequestParams};
use crate::response::{JsonRpcResponse, ResponsePayload};
use crate::types::{JsonRpcVersion, RequestId};
use crate::JSONRPC_VERSION;

/// One decoded JSON-RPC message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcEnvelope {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

impl JsonRpcEnvelope {
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcEnvelope::Request(request) => Some(&request.method),
            JsonRpcEnvelope::Notification(notification) => Some(&notification.method),
            JsonRpcEnvelope::Response(_) => None,
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcEnvelope {
    fn from(request: JsonRpcRequest) -> Self {
        JsonRpcEnvelope::Request(request)
    }
}

impl From<JsonRpcNotification> for JsonRpcEnvelope {
    fn from(notification: JsonRpcNotification) -> Self {
        JsonRpcEnvelope::Notification(notification)
    }
}

impl From<JsonRpcResponse> for JsonRpcEnvelope {
    fn from(response: JsonRpcResponse) -> Self {
        JsonRpcEnvelope::Response(response)
    }
}

/// Why a body failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body was not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The body was not valid JSON at all.
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    /// The body was JSON but not a valid JSON-RPC 2.0 message. `id` carries
    /// the request id when one could still be recovered from the malformed
    /// message, so the peer can be answered on the right correlation.
    #[error("invalid JSON-RPC message: {reason}")]
    InvalidMessage {
        id: Option<RequestId>,
        reason: String,
    },
}

impl DecodeError {
    /// True when the body never made it to a JSON value (encoding or syntax
    /// failure), i.e. the peer should be answered with a parse error rather
    /// than an invalid-request error.
    pub fn is_syntactic(&self) -> bool {
        matches!(self, DecodeError::Utf8(_) | DecodeError::Syntax(_))
    }

    /// The request id salvaged from a structurally invalid message, if any.
    pub fn recovered_id(&self) -> Option<&RequestId> {
        match self {
            DecodeError::InvalidMessage { id, .. } => id.as_ref(),
            _ => None,
        }
    }
}

/// Serialize an envelope to its wire body.
pub fn encode(envelope: &JsonRpcEnvelope) -> String {
    // The envelope types contain nothing a serializer can reject.
    serde_json::to_string(envelope).expect("JSON-RPC envelope serialization cannot fail")
}

/// Parse a wire body into an envelope.
pub fn decode(text: &str) -> Result<JsonRpcEnvelope, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(members) = value else {
        return Err(DecodeError::InvalidMessage {
            id: None,
            reason: "message must be a JSON object".into(),
        });
    };

    // Salvage the id up front so structural failures later in the walk can
    // still be answered on the right correlation.
    let salvaged = members.get("id").and_then(|id| decode_id(id).ok());

    classify(&members).map_err(|reason| DecodeError::InvalidMessage {
        id: salvaged,
        reason,
    })
}

fn classify(members: &Map<String, Value>) -> Result<JsonRpcEnvelope, String> {
    match members.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => return Err(format!("unsupported jsonrpc version '{other}'")),
        None => return Err("missing jsonrpc version member".into()),
    }

    if members.contains_key("method") {
        decode_call(members)
    } else {
        decode_response(members)
    }
}

fn decode_call(members: &Map<String, Value>) -> Result<JsonRpcEnvelope, String> {
    let method = members
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| "method must be a string".to_string())?
        .to_string();
    let params = decode_params(members.get("params"))?;

    match members.get("id") {
        None => Ok(JsonRpcNotification {
            version: JsonRpcVersion::V2,
            method,
            params,
        }
        .into()),
        Some(id) => Ok(JsonRpcRequest {
            version: JsonRpcVersion::V2,
            id: decode_id(id)?,
            method,
            params,
        }
        .into()),
    }
}

fn decode_response(members: &Map<String, Value>) -> Result<JsonRpcEnvelope, String> {
    let id = match members.get("id") {
        None => return Err("message has neither method nor id".into()),
        Some(Value::Null) => None,
        Some(id) => Some(decode_id(id)?),
    };

    let payload = match (members.get("result"), members.get("error")) {
        (Some(_), Some(_)) => return Err("response carries both result and error".into()),
        (Some(result), None) => ResponsePayload::Result {
            result: result.clone(),
        },
        (None, Some(error)) => ResponsePayload::Error {
            error: serde_json::from_value::<ErrorObject>(error.clone())
                .map_err(|e| format!("malformed error object: {e}"))?,
        },
        (None, None) => return Err("response carries neither result nor error".into()),
    };

    Ok(JsonRpcResponse {
        version: JsonRpcVersion::V2,
        id,
        payload,
    }
    .into())
}

fn decode_id(value: &Value) -> Result<RequestId, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(RequestId::Number)
            .ok_or_else(|| "numeric id must be an integer".to_string()),
        Value::String(s) => Ok(RequestId::String(s.clone())),
        _ => Err("id must be an integer or a string".into()),
    }
}

fn decode_params(value: Option<&Value>) -> Result<Option<RequestParams>, String> {
    match value {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(RequestParams::Null)),
        Some(Value::Array(values)) => Ok(Some(RequestParams::Array(values.clone()))),
        Some(Value::Object(map)) => Ok(Some(RequestParams::Object(
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ))),
        Some(_) => Err("params must be an array, an object, or null".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_request() {
        let envelope = decode(r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":["hi"]}"#).unwrap();
        let JsonRpcEnvelope::Request(request) = envelope else {
            panic!("expected request");
        };
        assert_eq!(request.id, RequestId::Number(1));
        assert_eq!(request.method, "echo");
    }

    #[test]
    fn test_decode_notification() {
        let envelope = decode(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(matches!(envelope, JsonRpcEnvelope::Notification(_)));
    }

    #[test]
    fn test_decode_responses() {
        let ok = decode(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        let JsonRpcEnvelope::Response(response) = ok else {
            panic!("expected response");
        };
        assert_eq!(response.result(), Some(&Value::Null));

        let err = decode(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#)
            .unwrap();
        let JsonRpcEnvelope::Response(response) = err else {
            panic!("expected response");
        };
        assert!(response.id.is_none());
        assert_eq!(response.error_object().unwrap().code, -32700);
    }

    #[test]
    fn test_result_and_error_exclusive() {
        let text = r#"{"jsonrpc":"2.0","id":1,"result":1,"error":{"code":1,"message":"x"}}"#;
        match decode(text) {
            Err(DecodeError::InvalidMessage { id, .. }) => {
                assert_eq!(id, Some(RequestId::Number(1)));
            }
            other => panic!("expected invalid message, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_message_salvages_id() {
        // id parses, method does not.
        let error = decode(r#"{"jsonrpc":"2.0","id":5,"method":123}"#).unwrap_err();
        assert_eq!(error.recovered_id(), Some(&RequestId::Number(5)));

        // The id itself is the broken member.
        let error = decode(r#"{"jsonrpc":"2.0","id":true,"method":"m"}"#).unwrap_err();
        assert_eq!(error.recovered_id(), None);
    }

    #[test]
    fn test_unknown_members_tolerated_not_echoed() {
        let envelope = decode(r#"{"jsonrpc":"2.0","id":1,"method":"m","x-trace":"abc"}"#).unwrap();
        let text = encode(&envelope);
        assert!(!text.contains("x-trace"));
    }

    #[test]
    fn test_syntax_error_is_distinct() {
        assert!(matches!(decode("{"), Err(DecodeError::Syntax(_))));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0"}"#),
            Err(DecodeError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn test_round_trip_preserves_params_null() {
        let envelope = decode(r#"{"jsonrpc":"2.0","id":"r","method":"m","params":null}"#).unwrap();
        let value: Value = serde_json::from_str(&encode(&envelope)).unwrap();
        assert_eq!(value.get("params"), Some(&json!(null)));
    }
}
