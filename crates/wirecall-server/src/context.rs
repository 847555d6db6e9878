//! Per-request state carried through the pipeline.

use serde_json::Value;
use wirecall_protocol::{
    ErrorObject, JsonRpcEnvelope, JsonRpcResponse, RequestId, RequestParams,
};

use crate::cancellation::CancellationHandle;
use crate::service::ServiceInstance;
use crate::session::Session;

/// Where a request is in its lifecycle. Transitions are monotonic; the
/// terminal states are `Responded` (requests) and `Dropped` (notifications
/// and consumed requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestState {
    Received,
    Parsed,
    Bound,
    Executing,
    Responded,
    Dropped,
}

/// The ephemeral value one pipeline traversal operates on.
///
/// Interceptors may inspect the inbound message, check cancellation, and
/// fill or replace the response slot. The context is owned by exactly one
/// traversal and moves through the chain by value.
pub struct RequestContext {
    envelope: JsonRpcEnvelope,
    pub cancel: CancellationHandle,
    pub session: Session,
    service: Option<ServiceInstance>,
    response: Option<JsonRpcResponse>,
    state: RequestState,
}

impl RequestContext {
    pub(crate) fn new(
        envelope: JsonRpcEnvelope,
        session: Session,
        cancel: CancellationHandle,
    ) -> Self {
        debug_assert!(!matches!(envelope, JsonRpcEnvelope::Response(_)));
        Self {
            envelope,
            cancel,
            session,
            service: None,
            response: None,
            state: RequestState::Received,
        }
    }

    pub fn method(&self) -> &str {
        self.envelope.method().unwrap_or_default()
    }

    pub fn params(&self) -> Option<&RequestParams> {
        match &self.envelope {
            JsonRpcEnvelope::Request(request) => request.params.as_ref(),
            JsonRpcEnvelope::Notification(notification) => notification.params.as_ref(),
            JsonRpcEnvelope::Response(_) => None,
        }
    }

    /// The request id; `None` for notifications.
    pub fn id(&self) -> Option<&RequestId> {
        match &self.envelope {
            JsonRpcEnvelope::Request(request) => Some(&request.id),
            _ => None,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self.envelope, JsonRpcEnvelope::Notification(_))
    }

    pub(crate) fn envelope(&self) -> &JsonRpcEnvelope {
        &self.envelope
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Advance the lifecycle. States never move backwards.
    pub(crate) fn advance(&mut self, state: RequestState) {
        debug_assert!(
            state >= self.state,
            "request state may not regress: {:?} -> {state:?}",
            self.state
        );
        self.state = self.state.max(state);
    }

    /// Settle the lifecycle in one of the two terminal states.
    pub(crate) fn finish(&mut self, state: RequestState) {
        debug_assert!(matches!(
            state,
            RequestState::Responded | RequestState::Dropped
        ));
        self.state = state;
    }

    pub(crate) fn set_service(&mut self, instance: ServiceInstance) {
        self.service = Some(instance);
    }

    pub fn service(&self) -> Option<&ServiceInstance> {
        self.service.as_ref()
    }

    /// Fill the response slot with a successful result. Notifications have
    /// no response; the value is discarded for them at completion.
    pub fn respond(&mut self, result: Value) {
        let id = self.id().cloned();
        if let Some(id) = id {
            self.response = Some(JsonRpcResponse::success(id, result));
        }
    }

    /// Fill the response slot with an error.
    pub fn respond_error(&mut self, error: ErrorObject) {
        let id = self.id().cloned();
        self.response = Some(JsonRpcResponse::error(id, error));
    }

    /// Replace the response slot wholesale.
    pub fn set_response(&mut self, response: JsonRpcResponse) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&JsonRpcResponse> {
        self.response.as_ref()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub(crate) fn take_response(&mut self) -> Option<JsonRpcResponse> {
        self.response.take()
    }
}
