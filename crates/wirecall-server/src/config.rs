//! Host configuration.

use std::time::Duration;

/// Tunables for a host. Construct with [`Default`] and adjust with the
/// setters, or set fields directly.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Inbound frames declaring a larger body are discarded and rejected.
    pub max_message_bytes: usize,

    /// How long [`stop`](crate::RpcHost::stop) waits for in-flight requests
    /// before cancelling them.
    pub shutdown_grace: Duration,

    /// Process requests strictly in arrival order instead of concurrently.
    pub preserve_foreign_method_order: bool,

    /// Carry unstructured handler failure text in the error `data` member.
    pub propagate_handler_exception_detail: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            max_message_bytes: wirecall_framing::reader::DEFAULT_MAX_MESSAGE_BYTES,
            shutdown_grace: Duration::from_secs(5),
            preserve_foreign_method_order: false,
            propagate_handler_exception_detail: true,
        }
    }
}

impl HostOptions {
    pub fn max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn preserve_foreign_method_order(mut self, preserve: bool) -> Self {
        self.preserve_foreign_method_order = preserve;
        self
    }

    pub fn propagate_handler_exception_detail(mut self, propagate: bool) -> Self {
        self.propagate_handler_exception_detail = propagate;
        self
    }
}
