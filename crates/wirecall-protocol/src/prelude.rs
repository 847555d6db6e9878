//! Convenience re-exports for protocol consumers.

pub use crate::codec::{decode, encode, DecodeError, JsonRpcEnvelope};
pub use crate::contract::{MethodSignature, ParamKind, ParamSpec, ReturnShape};
pub use crate::error::ErrorObject;
pub use crate::notification::JsonRpcNotification;
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcResponse, ResponsePayload};
pub use crate::types::{JsonRpcVersion, RequestId};
