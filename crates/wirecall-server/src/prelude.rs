//! Convenience re-exports for building hosts.

pub use crate::binder::{bind, BindError, Binding};
pub use crate::builder::{HostError, RpcHostBuilder};
pub use crate::cancellation::CancellationHandle;
pub use crate::catalog::{MethodCall, MethodCatalog, MethodFuture, ServiceDescriptor};
pub use crate::config::HostOptions;
pub use crate::context::{RequestContext, RequestState};
pub use crate::host::RpcHost;
pub use crate::interceptor::{BlockingNext, Interceptor, Next, SyncInterceptor};
pub use crate::service::{FnFactory, ServiceError, ServiceFactory, ServiceInstance};
pub use crate::session::Session;

pub use wirecall_protocol::prelude::*;
