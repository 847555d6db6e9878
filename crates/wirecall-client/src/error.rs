//! Client-side error surface.

use serde_json::Value;
use thiserror::Error;
use wirecall_protocol::ErrorObject;

pub type ClientResult<T> = Result<T, ClientError>;

/// Everything a call through the client can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No reply arrived within the call's budget. The correlation slot has
    /// been dropped; a late reply is discarded.
    #[error("call timed out")]
    Timeout,

    /// The call was cancelled locally (client shut down while pending).
    #[error("call cancelled")]
    Cancelled,

    /// The connection ended or the frame could not be written.
    #[error("transport error: {0}")]
    Transport(String),

    /// A declared proxy signature did not resolve to a table entry.
    #[error("method '{0}' is not supported by the bound table")]
    NotSupported(String),

    /// The peer answered with an error object.
    #[error("server error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error(transparent)]
    Framing(#[from] wirecall_framing::FramingError),
}

impl ClientError {
    pub(crate) fn server(error: ErrorObject) -> Self {
        ClientError::Server {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport(message.into())
    }

    /// The peer-supplied error code, when this is a server error.
    pub fn error_code(&self) -> Option<i64> {
        match self {
            ClientError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether retrying the call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::Transport(_))
    }
}
