//! # Framed Message Transport
//!
//! Frames discrete JSON-RPC messages on arbitrary byte streams using the
//! `Content-Length` header envelope:
//!
//! ```text
//! Content-Length: <decimal N>\r\n
//! Content-Type: application/vscode-jsonrpc; charset=utf8\r\n
//! \r\n
//! <N bytes of UTF-8 body, no BOM>
//! ```
//!
//! The writer emits header and body in one buffered write so frames can never
//! interleave; the reader tolerates unknown headers, parses header names
//! case-insensitively, and resynchronizes past oversized frames.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::FramingError;
pub use reader::FrameReader;
pub use writer::{FrameWriter, MessageObserver};

/// The Content-Type value emitted on every outbound frame.
pub const CONTENT_TYPE: &str = "application/vscode-jsonrpc; charset=utf8";
