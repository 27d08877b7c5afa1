//! Error types for rqap
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using QapError
pub type Result<T> = std::result::Result<T, QapError>;

/// Unified error type for rqap operations
#[derive(Debug, Error)]
pub enum QapError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before a full message was delivered.
    /// Distinct from `Io`: the bytes read so far were fine, there were
    /// just not enough of them.
    #[error("connection closed by peer mid-message")]
    Closed,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The byte stream violated the QAP1 framing rules. The connection is
    /// desynchronized and must not be reused.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A response parameter used a data type this client does not decode,
    /// or the server demanded an authentication scheme no cipher was
    /// supplied for.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    // -------------------------------------------------------------------------
    // Server-Reported Errors
    // -------------------------------------------------------------------------
    /// The server answered with an error status. The code comes from bits
    /// 24-30 of the response header; whether the connection stays usable
    /// depends on the code and is the caller's decision.
    #[error("Server error {:#04x}: {}", .code, crate::protocol::error_text(*.code))]
    Server { code: u8 },
}
