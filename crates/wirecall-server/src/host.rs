//! The running host: read loop, dispatch fan-out, and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wirecall_framing::{FrameReader, FrameWriter, FramingError, MessageObserver};
use wirecall_protocol::{ErrorObject, JsonRpcEnvelope, JsonRpcResponse};

use crate::cancellation::CancellationHandle;
use crate::config::HostOptions;
use crate::context::{RequestContext, RequestState};
use crate::pipeline::Pipeline;
use crate::session::Session;

/// A started JSON-RPC host bound to one pair of byte streams.
///
/// Requests fan out onto the runtime unless
/// [`preserve_foreign_method_order`](HostOptions::preserve_foreign_method_order)
/// is set, in which case the loop awaits each pipeline inline. Responses are
/// serialized through a shared framed writer, so concurrent completions
/// never interleave frames.
pub struct RpcHost {
    shared: Arc<HostShared>,
    read_task: Mutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

struct HostShared {
    /// Stops the read loop.
    stop_reading: CancellationHandle,
    /// Fired into every in-flight request when the drain grace elapses.
    cancel_requests: CancellationHandle,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl HostShared {
    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before the counter check so a decrement between the
            // two cannot be missed.
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl RpcHost {
    pub(crate) fn start<R, W>(
        pipeline: Pipeline,
        session: Session,
        options: HostOptions,
        observer: Option<Arc<dyn MessageObserver>>,
        reader: R,
        writer: W,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(HostShared {
            stop_reading: CancellationHandle::new(),
            cancel_requests: CancellationHandle::new(),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        });
        let shutdown_grace = options.shutdown_grace;
        let handle = tokio::spawn(read_loop(
            Arc::new(pipeline),
            session,
            options,
            observer,
            shared.clone(),
            reader,
            writer,
        ));
        Self {
            shared,
            read_task: Mutex::new(Some(handle)),
            shutdown_grace,
        }
    }

    /// Stop reading, drain in-flight requests within the configured grace,
    /// then cancel whatever remains and join the loop.
    pub async fn stop(&self) {
        info!("stopping host");
        self.shared.stop_reading.cancel();

        if tokio::time::timeout(self.shutdown_grace, self.shared.wait_idle())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.shared.in_flight.load(Ordering::SeqCst),
                "drain grace elapsed, cancelling in-flight requests"
            );
            self.shared.cancel_requests.cancel();
            if tokio::time::timeout(self.shutdown_grace, self.shared.wait_idle())
                .await
                .is_err()
            {
                warn!("requests ignored cancellation; abandoning them");
            }
        }

        if let Some(handle) = self.read_task.lock().await.take() {
            let _ = handle.await;
        }
        info!("host stopped");
    }

    /// Wait for the read loop to end (peer EOF or [`stop`](Self::stop)).
    pub async fn wait(&self) {
        let handle = self.read_task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn read_loop<R, W>(
    pipeline: Arc<Pipeline>,
    session: Session,
    options: HostOptions,
    observer: Option<Arc<dyn MessageObserver>>,
    shared: Arc<HostShared>,
    reader: R,
    writer: W,
) where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut reader = FrameReader::new(reader).with_limit(options.max_message_bytes);
    let mut frame_writer = FrameWriter::new(writer);
    if let Some(observer) = observer {
        frame_writer = frame_writer.with_observer(observer);
    }
    let writer = Arc::new(Mutex::new(frame_writer));

    loop {
        let result = tokio::select! {
            biased;
            _ = shared.stop_reading.cancelled() => break,
            result = reader.read() => result,
        };

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(FramingError::EndOfStream) => {
                info!("peer closed the stream");
                break;
            }
            Err(FramingError::Decode(decode)) => {
                // The frame was consumed; answer and keep reading. A
                // structurally invalid message may still carry a usable id,
                // which must be echoed so the peer can correlate the error.
                warn!(error = %decode, "undecodable frame");
                let response = if decode.is_syntactic() {
                    JsonRpcResponse::error(None, ErrorObject::parse_error(None))
                } else {
                    let id = decode.recovered_id().cloned();
                    JsonRpcResponse::error(id, ErrorObject::invalid_request(None))
                };
                write_response(&writer, response).await;
                continue;
            }
            Err(error @ FramingError::InvalidFrame { .. }) if error.is_recoverable() => {
                warn!(%error, "frame rejected");
                continue;
            }
            Err(error) => {
                error!(%error, "transport failure, terminating read loop");
                break;
            }
        };

        match envelope {
            JsonRpcEnvelope::Response(response) => {
                warn!(id = ?response.id, "ignoring unexpected response frame");
            }
            envelope => {
                let mut ctx = RequestContext::new(
                    envelope,
                    session.clone(),
                    shared.cancel_requests.clone(),
                );
                ctx.advance(RequestState::Parsed);
                shared.in_flight.fetch_add(1, Ordering::SeqCst);
                let job = handle_one(pipeline.clone(), writer.clone(), shared.clone(), ctx);
                if options.preserve_foreign_method_order {
                    job.await;
                } else {
                    tokio::spawn(job);
                }
            }
        }
    }

    debug!("read loop finished");
}

async fn handle_one(
    pipeline: Arc<Pipeline>,
    writer: Arc<Mutex<FrameWriter<impl AsyncWrite + Unpin>>>,
    shared: Arc<HostShared>,
    ctx: RequestContext,
) {
    let mut ctx = pipeline.run(ctx).await;
    if let Some(response) = ctx.take_response() {
        write_response(&writer, response).await;
    }
    if shared.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
        shared.idle.notify_waiters();
    }
}

async fn write_response(
    writer: &Arc<Mutex<FrameWriter<impl AsyncWrite + Unpin>>>,
    response: JsonRpcResponse,
) {
    let envelope = JsonRpcEnvelope::Response(response);
    if let Err(error) = writer.lock().await.write(&envelope).await {
        error!(%error, "failed to write response");
    }
}
