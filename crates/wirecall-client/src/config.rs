//! Client configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use wirecall_framing::MessageObserver;
use wirecall_protocol::JsonRpcEnvelope;

/// Callback for server-initiated traffic (requests and notifications the
/// correlation register has no slot for).
pub type ServerMessageHandler = Arc<dyn Fn(JsonRpcEnvelope) + Send + Sync>;

/// Tunables for a client connection.
#[derive(Clone)]
pub struct ClientOptions {
    /// Budget applied to [`send_request`](crate::RpcClient::send_request)
    /// calls that do not name their own timeout.
    pub default_call_timeout: Duration,

    /// Inbound frames declaring a larger body are discarded.
    pub max_message_bytes: usize,

    /// Receives server-initiated messages. When absent they are logged and
    /// dropped.
    pub on_server_message: Option<ServerMessageHandler>,

    /// Sees every serialized outbound body before its bytes are written.
    pub message_observer: Option<Arc<dyn MessageObserver>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_call_timeout: Duration::from_secs(30),
            max_message_bytes: wirecall_framing::reader::DEFAULT_MAX_MESSAGE_BYTES,
            on_server_message: None,
            message_observer: None,
        }
    }
}

impl ClientOptions {
    pub fn default_call_timeout(mut self, timeout: Duration) -> Self {
        self.default_call_timeout = timeout;
        self
    }

    pub fn max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    pub fn on_server_message(
        mut self,
        handler: impl Fn(JsonRpcEnvelope) + Send + Sync + 'static,
    ) -> Self {
        self.on_server_message = Some(Arc::new(handler));
        self
    }

    pub fn message_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.message_observer = Some(observer);
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("default_call_timeout", &self.default_call_timeout)
            .field("max_message_bytes", &self.max_message_bytes)
            .field("on_server_message", &self.on_server_message.is_some())
            .field("message_observer", &self.message_observer.is_some())
            .finish()
    }
}
