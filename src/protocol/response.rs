//! Response framing
//!
//! Reads and validates the 16-byte response header, then assembles the
//! body from the stream: either as a sequence of typed parameter blocks
//! (the normal path) or as one raw byte run (the file-streaming path).
//!
//! ## Response Format
//! ```text
//! ┌─────────────┬─────────────┬─────────────┬─────────────┬──────────┐
//! │ status (4)  │ len low (4) │ offset (4)  │ len high (4)│   body   │
//! └─────────────┴─────────────┴─────────────┴─────────────┴──────────┘
//! ```
//!
//! The low nibble of the status word is 1 on success; on failure, bits
//! 24-30 carry the server's error code. When the server reports an error
//! it may still send a body (an error message); that body is drained so
//! the stream stays framed for the next exchange.

use std::io::Read;

use crate::error::{QapError, Result};
use crate::network::transport;
use crate::sexp::Sexp;

use super::codec;
use super::wire::{self, PacketHeader, DT_SEXP, DT_STRING, FLAG_LARGE, PACKET_HEADER_LEN};

/// Upper bound on a single declared parameter length (1 GiB). A declared
/// length beyond this is treated as a framing fault rather than an
/// allocation request.
pub const MAX_PARAMETER_LEN: usize = 1 << 30;

// =============================================================================
// Server error codes
// =============================================================================

pub const ERR_AUTH_FAILED: u8 = 0x41;
pub const ERR_CONN_BROKEN: u8 = 0x42;
pub const ERR_INVALID_CMD: u8 = 0x43;
pub const ERR_INVALID_PAR: u8 = 0x44;
pub const ERR_R_ERROR: u8 = 0x45;
pub const ERR_IO_ERROR: u8 = 0x46;
pub const ERR_NOT_OPEN: u8 = 0x47;
pub const ERR_ACCESS_DENIED: u8 = 0x48;
pub const ERR_UNSUPPORTED_CMD: u8 = 0x49;
pub const ERR_UNKNOWN_CMD: u8 = 0x4a;
pub const ERR_DATA_OVERFLOW: u8 = 0x4b;
pub const ERR_OBJECT_TOO_BIG: u8 = 0x4c;
pub const ERR_OUT_OF_MEM: u8 = 0x4d;
pub const ERR_CTRL_CLOSED: u8 = 0x4e;
pub const ERR_SESSION_BUSY: u8 = 0x50;
pub const ERR_DETACH_FAILED: u8 = 0x51;
pub const ERR_DISABLED: u8 = 0x61;
pub const ERR_UNAVAILABLE: u8 = 0x62;
pub const ERR_CRYPT_ERROR: u8 = 0x63;
pub const ERR_SECURITY_CLOSE: u8 = 0x64;

/// Human-readable description of a server error code.
pub fn error_text(code: u8) -> &'static str {
    match code {
        ERR_AUTH_FAILED => "authentication failed",
        ERR_CONN_BROKEN => "connection closed or broken",
        ERR_INVALID_CMD => "invalid command",
        ERR_INVALID_PAR => "invalid parameter",
        ERR_R_ERROR => "R runtime error",
        ERR_IO_ERROR => "I/O error on the server",
        ERR_NOT_OPEN => "file is not open",
        ERR_ACCESS_DENIED => "access denied",
        ERR_UNSUPPORTED_CMD => "unsupported command",
        ERR_UNKNOWN_CMD => "unknown command",
        ERR_DATA_OVERFLOW => "incoming packet too big",
        ERR_OBJECT_TOO_BIG => "requested object too big to transport",
        ERR_OUT_OF_MEM => "server ran out of memory",
        ERR_CTRL_CLOSED => "control pipe to the master process closed",
        ERR_SESSION_BUSY => "session is still busy",
        ERR_DETACH_FAILED => "unable to detach session",
        ERR_DISABLED => "feature is disabled",
        ERR_UNAVAILABLE => "feature is not present in this build",
        ERR_CRYPT_ERROR => "crypto-system error",
        ERR_SECURITY_CLOSE => "connection closed for security reasons",
        _ => "unknown error code",
    }
}

// =============================================================================
// Response parsing
// =============================================================================

/// One decoded response parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// A string parameter, taken up to its NUL terminator.
    String(String),

    /// A decoded S-expression parameter.
    Sexp(Sexp),
}

impl Parameter {
    /// The S-expression inside, if this parameter is one.
    pub fn as_sexp(&self) -> Option<&Sexp> {
        match self {
            Parameter::Sexp(v) => Some(v),
            Parameter::String(_) => None,
        }
    }
}

/// Read and validate a response header.
///
/// On a server-reported error the declared body is consumed before the
/// error is returned, so the stream remains framed.
fn read_response_header<R: Read>(reader: &mut R) -> Result<PacketHeader> {
    let mut raw = [0u8; PACKET_HEADER_LEN];
    transport::read_exact_buf(reader, &mut raw)?;
    let header = PacketHeader::decode(&raw);

    if header.data_offset != 0 {
        return Err(QapError::Protocol(format!(
            "response header has nonzero data offset {}",
            header.data_offset
        )));
    }
    if header.command & 0xF != 1 {
        let code = ((header.command >> 24) & 0x7F) as u8;
        transport::skip(reader, header.body_len)?;
        return Err(QapError::Server { code });
    }
    Ok(header)
}

/// Read a complete response and decode its parameters.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Vec<Parameter>> {
    let header = read_response_header(reader)?;
    let mut remaining = header.body_len;
    let mut parameters = Vec::new();

    while remaining > 0 {
        if remaining < 4 {
            return Err(QapError::Protocol(format!(
                "response body ends {} bytes into a parameter header",
                remaining
            )));
        }

        // Parameter header: 4 bytes, extended to 8 by the large flag.
        let mut head = [0u8; 8];
        transport::read_exact_buf(reader, &mut head[..4])?;
        let head_len = if head[0] & FLAG_LARGE != 0 {
            if remaining < 8 {
                return Err(QapError::Protocol(
                    "response body ends inside a long parameter header".to_string(),
                ));
            }
            transport::read_exact_buf(reader, &mut head[4..8])?;
            8
        } else {
            4
        };
        let mut pos = 0;
        let block = wire::parse_header(&head[..head_len], &mut pos)?;

        if (block.size + block.len) as u64 > remaining {
            return Err(QapError::Protocol(format!(
                "parameter declares {} payload bytes but the response has {} left",
                block.len,
                remaining - block.size as u64
            )));
        }
        if block.len > MAX_PARAMETER_LEN {
            return Err(QapError::Protocol(format!(
                "parameter of {} bytes exceeds the {} byte limit",
                block.len, MAX_PARAMETER_LEN
            )));
        }

        let mut payload = vec![0u8; block.len];
        transport::read_exact_buf(reader, &mut payload)?;

        parameters.push(match block.ty {
            DT_STRING => Parameter::String(decode_param_string(&payload)?),
            DT_SEXP => Parameter::Sexp(codec::decode_sexp(&payload)?),
            other => {
                return Err(QapError::Unsupported(format!(
                    "response parameter of data type {}",
                    other
                )))
            }
        });
        remaining -= (block.size + block.len) as u64;
    }

    Ok(parameters)
}

/// Read a file-streaming response directly into `buf`.
///
/// The body is raw bytes with no parameter framing. Returns the number of
/// bytes received; zero signals end-of-stream. A body larger than `buf`
/// is drained and rejected, since its bytes cannot be delivered.
pub fn read_stream_response<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let header = read_response_header(reader)?;
    if header.body_len > buf.len() as u64 {
        transport::skip(reader, header.body_len)?;
        return Err(QapError::Protocol(format!(
            "streamed response of {} bytes overflows the {}-byte buffer",
            header.body_len,
            buf.len()
        )));
    }
    let len = header.body_len as usize;
    transport::read_exact_buf(reader, &mut buf[..len])?;
    Ok(len)
}

/// A string parameter runs to its first NUL; the padding after it is
/// ignored. A parameter without a terminator is taken whole.
fn decode_param_string(payload: &[u8]) -> Result<String> {
    let content = match payload.iter().position(|&b| b == 0) {
        Some(nul) => &payload[..nul],
        None => payload,
    };
    String::from_utf8(content.to_vec())
        .map_err(|e| QapError::Protocol(format!("invalid UTF-8 in string parameter: {}", e)))
}
