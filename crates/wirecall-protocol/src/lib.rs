//! # JSON-RPC 2.0 Protocol Types
//!
//! The transport-agnostic message model for the wirecall runtime: requests,
//! responses, notifications, error objects, the envelope codec, and the
//! declarative method contract shared by host and client.
//!
//! ## Design
//!
//! - **Exact wire fidelity**: integer ids stay integers, string ids stay
//!   strings, and `params: null` round-trips distinctly from params omitted.
//! - **Result xor error**: a [`JsonRpcResponse`] carries exactly one of the
//!   two via [`ResponsePayload`]; the invalid both/neither shapes are
//!   unrepresentable.
//! - **Tolerant parse**: unknown top-level members are ignored on decode and
//!   never echoed on encode.

pub mod codec;
pub mod contract;
pub mod error;
pub mod notification;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

pub use codec::{decode, encode, DecodeError, JsonRpcEnvelope};
pub use contract::{MethodSignature, ParamKind, ParamSpec, ReturnShape, SignatureError};
pub use error::{is_server_code, reserved_message, ErrorObject};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcResponse, ResponsePayload};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version string, emitted on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Implementation-defined server errors
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
