use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;
use wirecall_protocol::{encode, JsonRpcEnvelope};

use crate::error::FramingError;
use crate::CONTENT_TYPE;

/// Receives every serialized body just before its bytes hit the stream.
///
/// The buffer is borrowed for the duration of the call only; implementations
/// must copy anything they want to keep.
pub trait MessageObserver: Send + Sync {
    fn on_outbound(&self, body: &[u8]);
}

/// Writes framed messages to an async byte sink.
///
/// `write` is `&mut self`, so a single writer cannot interleave frames by
/// construction; concurrent callers share one writer behind an async mutex
/// and are served in await order. Each frame goes out as one buffered write
/// (header and body together) followed by a flush, and `write` returns only
/// once the bytes are flushed.
pub struct FrameWriter<W> {
    sink: W,
    scratch: Vec<u8>,
    observer: Option<Arc<dyn MessageObserver>>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            scratch: Vec::new(),
            observer: None,
        }
    }

    /// Attach a message observer. It sees each serialized body before the
    /// bytes are written.
    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Serialize, frame, and flush one message.
    pub async fn write(&mut self, envelope: &JsonRpcEnvelope) -> Result<(), FramingError> {
        let body = encode(envelope);
        let body = body.as_bytes();

        if let Some(observer) = &self.observer {
            observer.on_outbound(body);
        }

        self.scratch.clear();
        self.scratch
            .extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        self.scratch
            .extend_from_slice(format!("Content-Type: {CONTENT_TYPE}\r\n\r\n").as_bytes());
        self.scratch.extend_from_slice(body);

        trace!(bytes = self.scratch.len(), "writing frame");
        self.sink.write_all(&self.scratch).await?;
        self.sink.flush().await?;
        Ok(())
    }

    /// Flush and shut down the underlying sink.
    pub async fn shutdown(&mut self) -> Result<(), FramingError> {
        self.sink.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wirecall_protocol::JsonRpcNotification;

    #[tokio::test]
    async fn test_frame_layout() {
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out);
        let envelope = JsonRpcNotification::new("ping", None).into();
        writer.write(&envelope).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let body = r#"{"jsonrpc":"2.0","method":"ping"}"#;
        assert_eq!(
            text,
            format!(
                "Content-Length: {}\r\nContent-Type: {CONTENT_TYPE}\r\n\r\n{body}",
                body.len()
            )
        );
        // No trailing newline after the body.
        assert!(text.ends_with('}'));
    }

    #[tokio::test]
    async fn test_observer_sees_body_before_stream() {
        struct Capture(Mutex<Vec<Vec<u8>>>);
        impl MessageObserver for Capture {
            fn on_outbound(&self, body: &[u8]) {
                self.0.lock().unwrap().push(body.to_vec());
            }
        }

        let capture = Arc::new(Capture(Mutex::new(Vec::new())));
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out).with_observer(capture.clone());
        writer
            .write(&JsonRpcNotification::new("ping", None).into())
            .await
            .unwrap();

        let seen = capture.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], br#"{"jsonrpc":"2.0","method":"ping"}"#);
    }
}
