use thiserror::Error;
use wirecall_protocol::DecodeError;

/// Transport-level failures surfaced by the framed reader and writer.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Clean EOF between frames.
    #[error("end of stream")]
    EndOfStream,

    /// EOF in the middle of a header block or a declared body.
    #[error("unexpected end of stream mid-frame")]
    UnexpectedEof,

    /// Malformed header block, an undecipherable frame boundary, or a frame
    /// rejected for exceeding the size limit. `recoverable` is true when the
    /// reader has already consumed the offending frame (the oversize case,
    /// where the declared bytes are discarded to resynchronize), so the
    /// stream is positioned at the next frame; a broken header leaves the
    /// stream position unreliable.
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String, recoverable: bool },

    /// The body was not valid UTF-8 or did not decode as a JSON-RPC message.
    /// The frame was fully consumed.
    #[error("body decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// A malformed frame the reader cannot skip past.
    pub(crate) fn invalid_frame(reason: impl Into<String>) -> Self {
        FramingError::InvalidFrame {
            reason: reason.into(),
            recoverable: false,
        }
    }

    /// An oversized frame whose declared bytes were consumed and discarded.
    pub(crate) fn oversized_frame(declared: usize, limit: usize) -> Self {
        FramingError::InvalidFrame {
            reason: format!("declared body of {declared} bytes exceeds limit of {limit}"),
            recoverable: true,
        }
    }

    /// Whether the read loop can keep going after this error. Oversized and
    /// undecodable frames leave the stream at the next frame boundary; EOF,
    /// malformed headers, and I/O errors do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FramingError::InvalidFrame {
                recoverable: true,
                ..
            } | FramingError::Decode(_)
        )
    }
}
