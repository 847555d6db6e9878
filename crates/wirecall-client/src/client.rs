//! The client invoker: outbound emission, reply correlation, timeouts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wirecall_framing::{FrameReader, FrameWriter, FramingError};
use wirecall_protocol::{
    ErrorObject, JsonRpcEnvelope, JsonRpcNotification, JsonRpcRequest, RequestId, RequestParams,
    ResponsePayload,
};

use crate::config::ClientOptions;
use crate::error::{ClientError, ClientResult};

/// How a correlation slot completes.
enum SlotOutcome {
    Result(Value),
    Error(ErrorObject),
    Disconnected,
    Cancelled,
}

type Slot = oneshot::Sender<SlotOutcome>;

struct ClientShared {
    /// Correlation register: in-flight id → completion slot. Guarded by a
    /// plain mutex; never held across an await.
    pending: SyncMutex<HashMap<RequestId, Slot>>,
    /// Monotonic id source, starting at 1 and wrapping only at exhaustion.
    next_id: AtomicI64,
    closed: AtomicBool,
    options: ClientOptions,
}

impl ClientShared {
    /// Allocate the next request id, skipping ids still in flight.
    fn allocate(&self, pending: &HashMap<RequestId, Slot>) -> RequestId {
        loop {
            let previous = self
                .next_id
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    Some(if n >= i64::MAX { 1 } else { n + 1 })
                })
                .unwrap_or(1);
            let id = RequestId::Number(previous);
            if !pending.contains_key(&id) {
                return id;
            }
        }
    }

    fn drain(&self, outcome: fn() -> SlotOutcome) {
        let drained: Vec<(RequestId, Slot)> = self.pending.lock().drain().collect();
        for (id, slot) in drained {
            debug!(%id, "completing pending call after connection loss");
            let _ = slot.send(outcome());
        }
    }
}

/// Removes the correlation slot unless the call completed. Dropping the
/// pending-call future (cancellation) or timing out runs this, so a late
/// reply finds no slot and is discarded.
struct SlotGuard {
    shared: Arc<ClientShared>,
    id: Option<RequestId>,
}

impl SlotGuard {
    fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if self.shared.pending.lock().remove(&id).is_some() {
                debug!(%id, "removed correlation slot for abandoned call");
            }
        }
    }
}

/// A connected JSON-RPC client over one pair of byte streams.
pub struct RpcClient {
    shared: Arc<ClientShared>,
    writer: Mutex<FrameWriter<Box<dyn AsyncWrite + Send + Unpin>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcClient {
    /// Bind a client to a byte-stream pair and start its reply reader.
    pub fn connect<R, W>(reader: R, writer: W, options: ClientOptions) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(ClientShared {
            pending: SyncMutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            options,
        });
        let mut frame_writer: FrameWriter<Box<dyn AsyncWrite + Send + Unpin>> =
            FrameWriter::new(Box::new(writer));
        if let Some(observer) = shared.options.message_observer.clone() {
            frame_writer = frame_writer.with_observer(observer);
        }
        let reader_task = tokio::spawn(read_loop(shared.clone(), reader));
        Self {
            shared,
            writer: Mutex::new(frame_writer),
            reader_task: Mutex::new(Some(reader_task)),
        }
    }

    /// Send a request and await its reply under the default timeout.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<RequestParams>,
    ) -> ClientResult<Value> {
        self.send_request_with_timeout(method, params, None).await
    }

    /// Send a request and await its reply within `timeout` (falling back to
    /// the configured default). On expiry the correlation slot is dropped
    /// and a late reply has no effect.
    pub async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Option<RequestParams>,
        timeout: Option<Duration>,
    ) -> ClientResult<Value> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ClientError::transport("connection closed"));
        }

        let (slot, reply) = oneshot::channel();
        let id = {
            let mut pending = self.shared.pending.lock();
            let id = self.shared.allocate(&pending);
            pending.insert(id.clone(), slot);
            id
        };
        let guard = SlotGuard {
            shared: self.shared.clone(),
            id: Some(id.clone()),
        };

        debug!(%id, method, "sending request");
        self.write(&JsonRpcRequest::new(id, method, params).into())
            .await?;

        let budget = timeout.unwrap_or(self.shared.options.default_call_timeout);
        let outcome = match tokio::time::timeout(budget, reply).await {
            Err(_) => return Err(ClientError::Timeout),
            Ok(Err(_)) => return Err(ClientError::transport("connection closed")),
            Ok(Ok(outcome)) => outcome,
        };
        guard.disarm();

        match outcome {
            SlotOutcome::Result(value) => Ok(value),
            SlotOutcome::Error(error) => Err(ClientError::server(error)),
            SlotOutcome::Disconnected => Err(ClientError::transport("connection closed before reply")),
            SlotOutcome::Cancelled => Err(ClientError::Cancelled),
        }
    }

    /// Send a notification. Returns once the bytes are flushed.
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
    ) -> ClientResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ClientError::transport("connection closed"));
        }
        debug!(method, "sending notification");
        self.write(&JsonRpcNotification::new(method, params).into())
            .await
    }

    /// Tear the connection down. Pending calls complete with
    /// [`ClientError::Cancelled`].
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
        self.shared.drain(|| SlotOutcome::Cancelled);
        if let Err(e) = self.writer.lock().await.shutdown().await {
            debug!(error = %e, "writer shutdown failed");
        }
        info!("client shut down");
    }

    async fn write(&self, envelope: &JsonRpcEnvelope) -> ClientResult<()> {
        self.writer.lock().await.write(envelope).await?;
        Ok(())
    }
}

async fn read_loop<R>(shared: Arc<ClientShared>, reader: R)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = FrameReader::new(reader).with_limit(shared.options.max_message_bytes);
    loop {
        match reader.read().await {
            Ok(JsonRpcEnvelope::Response(response)) => match response.id.clone() {
                Some(id) => {
                    let slot = shared.pending.lock().remove(&id);
                    match slot {
                        Some(slot) => {
                            let outcome = match response.payload {
                                ResponsePayload::Result { result } => SlotOutcome::Result(result),
                                ResponsePayload::Error { error } => SlotOutcome::Error(error),
                            };
                            let _ = slot.send(outcome);
                        }
                        None => debug!(%id, "discarding reply for unknown or cancelled id"),
                    }
                }
                None => {
                    // The peer could not correlate our frame (e.g. its parse
                    // error reply). Nothing to complete.
                    warn!("received response with null id");
                    if let Some(handler) = &shared.options.on_server_message {
                        handler(JsonRpcEnvelope::Response(response));
                    }
                }
            },
            Ok(envelope) => match &shared.options.on_server_message {
                Some(handler) => handler(envelope),
                None => debug!(
                    method = envelope.method().unwrap_or_default(),
                    "dropping server-initiated message"
                ),
            },
            Err(FramingError::EndOfStream) => {
                info!("server closed the stream");
                break;
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "skipping undecodable frame");
            }
            Err(e) => {
                error!(error = %e, "transport failure");
                break;
            }
        }
    }
    shared.closed.store(true, Ordering::SeqCst);
    shared.drain(|| SlotOutcome::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio::io::{duplex, split};
    use wirecall_protocol::JsonRpcResponse;

    /// A scripted peer: answers every request by echoing its first param,
    /// records notifications, never answers methods named "slow".
    fn spawn_echo_server(
        stream: tokio::io::DuplexStream,
    ) -> (Arc<StdMutex<Vec<String>>>, Arc<StdMutex<Vec<RequestId>>>) {
        let notifications = Arc::new(StdMutex::new(Vec::new()));
        let seen_ids = Arc::new(StdMutex::new(Vec::new()));
        let (rx, tx) = split(stream);
        let notifications_task = notifications.clone();
        let seen_task = seen_ids.clone();
        tokio::spawn(async move {
            let mut reader = FrameReader::new(rx);
            let mut writer = FrameWriter::new(tx);
            loop {
                match reader.read().await {
                    Ok(JsonRpcEnvelope::Request(request)) => {
                        seen_task.lock().unwrap().push(request.id.clone());
                        if request.method == "slow" {
                            continue;
                        }
                        let result = match &request.params {
                            Some(RequestParams::Array(values)) => {
                                values.first().cloned().unwrap_or(Value::Null)
                            }
                            _ => Value::Null,
                        };
                        let response = JsonRpcResponse::success(request.id, result);
                        writer.write(&response.into()).await.unwrap();
                    }
                    Ok(JsonRpcEnvelope::Notification(notification)) => {
                        notifications_task.lock().unwrap().push(notification.method);
                    }
                    _ => break,
                }
            }
        });
        (notifications, seen_ids)
    }

    fn connect_pair() -> (
        RpcClient,
        Arc<StdMutex<Vec<String>>>,
        Arc<StdMutex<Vec<RequestId>>>,
    ) {
        let (client_stream, server_stream) = duplex(64 * 1024);
        let (notifications, ids) = spawn_echo_server(server_stream);
        let (rx, tx) = split(client_stream);
        let client = RpcClient::connect(rx, tx, ClientOptions::default());
        (client, notifications, ids)
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let (client, _, _) = connect_pair();
        let result = client
            .send_request("echo", Some(RequestParams::Array(vec![json!("hi")])))
            .await
            .unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn test_notification_flushes_without_reply() {
        let (client, notifications, _) = connect_pair();
        client.send_notification("ping", None).await.unwrap();
        // Round-trip a request to be sure the server consumed the notification.
        client
            .send_request("echo", Some(RequestParams::Array(vec![json!(1)])))
            .await
            .unwrap();
        assert_eq!(*notifications.lock().unwrap(), vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_then_late_reply_is_discarded() {
        let (client_stream, server_stream) = duplex(64 * 1024);
        let (server_rx, server_tx) = split(server_stream);
        let (rx, tx) = split(client_stream);
        let client = RpcClient::connect(rx, tx, ClientOptions::default());

        let error = client
            .send_request_with_timeout("slow", None, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Timeout));
        assert!(client.shared.pending.lock().is_empty());

        // Reply late, for the id the client used (1).
        let mut reader = FrameReader::new(server_rx);
        let mut writer = FrameWriter::new(server_tx);
        let JsonRpcEnvelope::Request(request) = reader.read().await.unwrap() else {
            panic!("expected request");
        };
        writer
            .write(&JsonRpcResponse::success(request.id, json!("late")).into())
            .await
            .unwrap();

        // The late reply produces no side effects; the client still works.
        tokio::spawn(async move {
            let JsonRpcEnvelope::Request(request) = reader.read().await.unwrap() else {
                panic!("expected request");
            };
            writer
                .write(&JsonRpcResponse::success(request.id, json!("fresh")).into())
                .await
                .unwrap();
        });
        let result = client.send_request("echo", None).await.unwrap();
        assert_eq!(result, json!("fresh"));
    }

    #[tokio::test]
    async fn test_concurrent_ids_are_distinct() {
        let (client, _, ids) = connect_pair();
        let client = Arc::new(client);
        let mut calls = Vec::new();
        for i in 0..32 {
            let client = client.clone();
            calls.push(tokio::spawn(async move {
                client
                    .send_request("echo", Some(RequestParams::Array(vec![json!(i)])))
                    .await
                    .unwrap()
            }));
        }
        for call in calls {
            call.await.unwrap();
        }
        let seen = ids.lock().unwrap();
        let mut unique: Vec<_> = seen.clone();
        unique.sort_by_key(|id| id.as_number());
        unique.dedup();
        assert_eq!(unique.len(), seen.len());
    }

    #[tokio::test]
    async fn test_dropping_pending_call_cancels_it() {
        let (client_stream, _server_stream) = duplex(64 * 1024);
        let (rx, tx) = split(client_stream);
        let client = RpcClient::connect(rx, tx, ClientOptions::default());

        let call = client.send_request_with_timeout("slow", None, Some(Duration::from_secs(60)));
        // Poll long enough for the request to be registered, then drop.
        let _ = tokio::time::timeout(Duration::from_millis(50), call).await;
        assert!(client.shared.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_completes_pending_calls() {
        let (client_stream, server_stream) = duplex(64 * 1024);
        let (rx, tx) = split(client_stream);
        let client = RpcClient::connect(rx, tx, ClientOptions::default());

        let pending = tokio::spawn({
            let (srx, stx) = split(server_stream);
            async move {
                // Consume the request, then hang up.
                let mut reader = FrameReader::new(srx);
                let _ = reader.read().await;
                drop(reader);
                drop(stx);
            }
        });
        let error = client.send_request("echo", None).await.unwrap_err();
        assert!(matches!(error, ClientError::Transport(_)));
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_initiated_messages_reach_callback() {
        let (client_stream, server_stream) = duplex(64 * 1024);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let options = ClientOptions::default().on_server_message(move |envelope| {
            seen_cb
                .lock()
                .unwrap()
                .push(envelope.method().unwrap_or_default().to_string());
        });
        let (rx, tx) = split(client_stream);
        let _client = RpcClient::connect(rx, tx, options);

        let (_srx, stx) = split(server_stream);
        let mut writer = FrameWriter::new(stx);
        writer
            .write(&JsonRpcNotification::new("event", None).into())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["event".to_string()]);
    }
}
