//! # JSON-RPC Host Framework
//!
//! The server half of the wirecall runtime: a declarative method catalog, a
//! deterministic overload binder, a continuation-passing interceptor
//! pipeline, per-request service instantiation, and a framed-stream host
//! loop, composed through a builder.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wirecall_server::prelude::*;
//! use serde_json::{json, Value};
//!
//! let echo = ServiceDescriptor::new("echo-service").method(
//!     MethodSignature::new("echo").required("text", ParamKind::String),
//!     |_instance, call| Box::pin(async move { Ok(call.args.into_iter().next().unwrap()) }),
//! );
//!
//! let host = RpcHostBuilder::new()
//!     .register(echo)
//!     .build(reader, writer)?;
//! host.wait().await;
//! ```
//!
//! ## Architecture
//!
//! Handlers return domain errors ([`ServiceError`]); the pipeline owns the
//! conversion to protocol error objects. The catalog, interceptor chain,
//! service factories, and session are immutable once [`RpcHostBuilder::build`]
//! returns.

pub mod binder;
pub mod builder;
pub mod cancellation;
pub mod catalog;
pub mod config;
pub mod context;
pub mod host;
pub mod interceptor;
pub mod pipeline;
pub mod prelude;
pub mod service;
pub mod session;

pub use binder::{bind, BindError, Binding};
pub use builder::{HostError, RpcHostBuilder};
pub use cancellation::CancellationHandle;
pub use catalog::{
    BoundMethod, CatalogError, MethodCall, MethodCatalog, MethodFuture, MethodTarget,
    ServiceDescriptor,
};
pub use config::HostOptions;
pub use context::{RequestContext, RequestState};
pub use host::RpcHost;
pub use interceptor::{BlockingNext, Interceptor, Next, SyncInterceptor};
pub use service::{FnFactory, ServiceError, ServiceFactory, ServiceInstance};
pub use session::Session;

// Re-export the protocol surface handlers touch constantly.
pub use wirecall_protocol::{
    ErrorObject, JsonRpcEnvelope, MethodSignature, ParamKind, ParamSpec, RequestParams, ReturnShape,
};
