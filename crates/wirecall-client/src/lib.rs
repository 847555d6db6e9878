//! # JSON-RPC Client
//!
//! The client half of the wirecall runtime: an invoker that emits framed
//! requests and notifications, correlates replies by id, enforces per-call
//! timeouts, and a method-table proxy surface that fronts the invoker with
//! declared signatures.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wirecall_client::prelude::*;
//!
//! let client = RpcClient::connect(reader, writer, ClientOptions::default());
//! let sum = client
//!     .send_request("add", Some(RequestParams::Array(vec![1.into(), 2.into()])))
//!     .await?;
//! ```
//!
//! Dropping a pending call cancels it: the correlation slot is removed and a
//! late reply is discarded silently.

pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod proxy;

pub use client::RpcClient;
pub use config::ClientOptions;
pub use error::{ClientError, ClientResult};
pub use proxy::{MethodTable, ProxyBinder, RpcProxy};

pub use wirecall_protocol::{ErrorObject, MethodSignature, ParamKind, RequestParams, ReturnShape};
