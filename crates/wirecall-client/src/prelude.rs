//! Convenience re-exports for client consumers.

pub use crate::client::RpcClient;
pub use crate::config::ClientOptions;
pub use crate::error::{ClientError, ClientResult};
pub use crate::proxy::{MethodTable, ProxyBinder, RpcProxy};

pub use wirecall_protocol::prelude::*;
