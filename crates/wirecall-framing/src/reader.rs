use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{trace, warn};
use wirecall_protocol::{decode, JsonRpcEnvelope};

use crate::error::FramingError;

/// Default cap on a single message body.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

/// Reads framed messages from an async byte source.
///
/// One call to [`read`](Self::read) consumes exactly one framed region of the
/// stream, or fails. Header names are matched case-insensitively, values are
/// trimmed of ASCII whitespace, and headers other than `Content-Length` and
/// `Content-Type` are ignored.
pub struct FrameReader<R> {
    source: BufReader<R>,
    max_message_bytes: usize,
    line: Vec<u8>,
    body: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source: BufReader::new(source),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            line: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Reject frames whose declared body exceeds `limit` bytes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.max_message_bytes = limit;
        self
    }

    /// Read one framed message.
    pub async fn read(&mut self) -> Result<JsonRpcEnvelope, FramingError> {
        let declared = self.read_header_block().await?;

        if declared > self.max_message_bytes {
            self.discard(declared).await?;
            warn!(declared, limit = self.max_message_bytes, "discarded oversized frame");
            return Err(FramingError::oversized_frame(declared, self.max_message_bytes));
        }

        self.body.resize(declared, 0);
        self.source
            .read_exact(&mut self.body)
            .await
            .map_err(eof_mid_frame)?;

        trace!(bytes = declared, "read frame");
        let text = std::str::from_utf8(&self.body).map_err(wirecall_protocol::DecodeError::from)?;
        Ok(decode(text)?)
    }

    /// Parse the header block, returning the declared Content-Length.
    /// A clean EOF before the first header byte is `EndOfStream`; EOF
    /// anywhere later in the block is `UnexpectedEof`.
    async fn read_header_block(&mut self) -> Result<usize, FramingError> {
        let mut content_length: Option<usize> = None;
        let mut first_line = true;

        loop {
            self.line.clear();
            let read = self.source.read_until(b'\n', &mut self.line).await?;
            if read == 0 {
                return Err(if first_line {
                    FramingError::EndOfStream
                } else {
                    FramingError::UnexpectedEof
                });
            }
            if !self.line.ends_with(b"\r\n") {
                return Err(if self.line.ends_with(b"\n") {
                    FramingError::invalid_frame("header line not terminated by CRLF")
                } else {
                    FramingError::UnexpectedEof
                });
            }
            first_line = false;

            let line = &self.line[..self.line.len() - 2];
            if line.is_empty() {
                // Blank line terminates the header block.
                return content_length
                    .ok_or_else(|| FramingError::invalid_frame("missing Content-Length header"));
            }
            let text = std::str::from_utf8(line)
                .ok()
                .filter(|text| text.is_ascii())
                .ok_or_else(|| FramingError::invalid_frame("non-ASCII header line"))?;
            let Some((name, value)) = text.split_once(':') else {
                return Err(FramingError::invalid_frame(format!(
                    "header line without ':' separator: {text:?}"
                )));
            };
            let name = name.trim();
            let value = value.trim();

            if name.eq_ignore_ascii_case("content-length") {
                let length = value.parse::<usize>().map_err(|_| {
                    FramingError::invalid_frame(format!("unparseable Content-Length {value:?}"))
                })?;
                content_length = Some(length);
            } else if name.eq_ignore_ascii_case("content-type") {
                check_charset(value)?;
            }
            // Other headers are ignored.
        }
    }

    /// Skip `count` body bytes to resynchronize past a rejected frame.
    async fn discard(&mut self, mut count: usize) -> Result<(), FramingError> {
        let mut sink = [0u8; 4096];
        while count > 0 {
            let take = count.min(sink.len());
            self.source
                .read_exact(&mut sink[..take])
                .await
                .map_err(eof_mid_frame)?;
            count -= take;
        }
        Ok(())
    }
}

/// `charset` defaults to utf-8 when absent; anything else is rejected.
fn check_charset(content_type: &str) -> Result<(), FramingError> {
    for part in content_type.split(';').skip(1) {
        if let Some((key, value)) = part.split_once('=') {
            if key.trim().eq_ignore_ascii_case("charset") {
                let charset = value.trim().trim_matches('"');
                if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("utf8") {
                    return Err(FramingError::invalid_frame(format!(
                        "unsupported charset {charset:?}"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn eof_mid_frame(error: std::io::Error) -> FramingError {
    if error.kind() == std::io::ErrorKind::UnexpectedEof {
        FramingError::UnexpectedEof
    } else {
        FramingError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::FrameWriter;
    use tokio::io::AsyncWriteExt;
    use wirecall_protocol::{DecodeError, JsonRpcRequest, RequestId};

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    #[tokio::test]
    async fn test_round_trip_consumes_exact_region() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_rx, _server_tx) = tokio::io::split(server);
        let (_client_rx, client_tx) = tokio::io::split(client);

        let mut writer = FrameWriter::new(client_tx);
        let mut reader = FrameReader::new(server_rx);

        for id in 1..=3i64 {
            writer
                .write(&JsonRpcRequest::with_positional(id, "echo", vec![serde_json::json!("hi")]).into())
                .await
                .unwrap();
        }
        for id in 1..=3i64 {
            let envelope = reader.read().await.unwrap();
            let JsonRpcEnvelope::Request(request) = envelope else {
                panic!("expected request");
            };
            assert_eq!(request.id, RequestId::Number(id));
        }
    }

    #[tokio::test]
    async fn test_header_case_insensitive_and_unknown_ignored() {
        let body = r#"{"jsonrpc":"2.0","method":"ping"}"#;
        let bytes = format!(
            "X-Custom: whatever\r\ncontent-LENGTH:  {} \r\n\r\n{}",
            body.len(),
            body
        );
        let mut reader = FrameReader::new(bytes.as_bytes());
        assert!(matches!(
            reader.read().await.unwrap(),
            JsonRpcEnvelope::Notification(_)
        ));
    }

    #[tokio::test]
    async fn test_content_type_charset() {
        let body = r#"{"jsonrpc":"2.0","method":"ping"}"#;
        let ok = format!(
            "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=UTF-8\r\n\r\n{}",
            body.len(),
            body
        );
        assert!(FrameReader::new(ok.as_bytes()).read().await.is_ok());

        let bad = format!(
            "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=latin-1\r\n\r\n{}",
            body.len(),
            body
        );
        assert!(matches!(
            FrameReader::new(bad.as_bytes()).read().await,
            Err(FramingError::InvalidFrame { .. })
        ));
    }

    #[tokio::test]
    async fn test_clean_eof_between_frames() {
        let mut reader = FrameReader::new(&b""[..]);
        assert!(matches!(reader.read().await, Err(FramingError::EndOfStream)));
    }

    #[tokio::test]
    async fn test_eof_mid_body() {
        let bytes = b"Content-Length: 100\r\n\r\n{\"jsonrpc\":";
        let mut reader = FrameReader::new(&bytes[..]);
        assert!(matches!(reader.read().await, Err(FramingError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_eof_mid_header() {
        let bytes = b"Content-Length: 10";
        let mut reader = FrameReader::new(&bytes[..]);
        assert!(matches!(reader.read().await, Err(FramingError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let bytes = b"Content-Type: application/vscode-jsonrpc\r\n\r\n";
        let mut reader = FrameReader::new(&bytes[..]);
        match reader.read().await {
            Err(FramingError::InvalidFrame { recoverable, .. }) => assert!(!recoverable),
            other => panic!("expected InvalidFrame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_length_body_is_parse_failure() {
        let mut reader = FrameReader::new(&b"Content-Length: 0\r\n\r\n"[..]);
        match reader.read().await {
            Err(FramingError::Decode(error)) => assert!(error.is_syntactic()),
            other => panic!("expected syntactic decode failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversize_frame_resynchronizes() {
        let (mut tx, rx) = tokio::io::duplex(64 * 1024);
        let big = format!(r#"{{"jsonrpc":"2.0","method":"big","params":["{}"]}}"#, "x".repeat(200));
        let mut bytes = frame(&big);
        bytes.extend_from_slice(&frame(r#"{"jsonrpc":"2.0","method":"ping"}"#));
        tx.write_all(&bytes).await.unwrap();
        drop(tx);

        let mut reader = FrameReader::new(rx).with_limit(128);
        match reader.read().await {
            Err(error @ FramingError::InvalidFrame { .. }) => {
                assert!(error.is_recoverable());
            }
            other => panic!("expected InvalidFrame, got {other:?}"),
        }
        // The next frame is intact.
        let envelope = reader.read().await.unwrap();
        assert_eq!(envelope.method(), Some("ping"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_body() {
        let mut bytes = b"Content-Length: 4\r\n\r\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, 0x20, 0x20]);
        let mut reader = FrameReader::new(&bytes[..]);
        match reader.read().await {
            Err(FramingError::Decode(DecodeError::Utf8(_))) => {}
            other => panic!("expected UTF-8 decode failure, got {other:?}"),
        }
    }
}
