//! The JSON-RPC error object and the reserved error codes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_codes;

/// Default message for each reserved JSON-RPC 2.0 code, in code order.
const RESERVED_MESSAGES: [(i64, &str); 5] = [
    (error_codes::PARSE_ERROR, "Parse error"),
    (error_codes::INVALID_REQUEST, "Invalid Request"),
    (error_codes::METHOD_NOT_FOUND, "Method not found"),
    (error_codes::INVALID_PARAMS, "Invalid params"),
    (error_codes::INTERNAL_ERROR, "Internal error"),
];

/// The standard message for a reserved code, when `code` is one.
pub fn reserved_message(code: i64) -> Option<&'static str> {
    RESERVED_MESSAGES
        .iter()
        .find_map(|(reserved, message)| (*reserved == code).then_some(*message))
}

/// Whether `code` lies in the implementation-defined server error range.
pub fn is_server_code(code: i64) -> bool {
    (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&code)
}

/// The JSON-RPC error object carried in an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// An error with an explicit code and message.
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    /// A reserved-kind error carrying its standard message.
    fn reserved(code: i64, data: Option<Value>) -> Self {
        let message = reserved_message(code).unwrap_or("Server error");
        Self::new(code, message, data)
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::reserved(error_codes::PARSE_ERROR, data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::reserved(error_codes::INVALID_REQUEST, data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method '{method}' not found"),
            None,
        )
    }

    pub fn invalid_params(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message, data)
    }

    pub fn internal_error(data: Option<Value>) -> Self {
        Self::reserved(error_codes::INTERNAL_ERROR, data)
    }

    /// An implementation-defined error. `code` must lie in the reserved
    /// server range; see [`is_server_code`].
    pub fn server_error(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        debug_assert!(is_server_code(code), "code {code} outside the server error range");
        Self::new(code, message, data)
    }

    /// Whether this error's code is one of the five reserved kinds.
    pub fn is_reserved(&self) -> bool {
        reserved_message(self.code).is_some()
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}
