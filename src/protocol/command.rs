//! Request framing
//!
//! Builds complete request packets: a 16-byte packet header followed by
//! the command's arguments, each framed as a typed parameter block.

use bytes::{BufMut, BytesMut};

use crate::sexp::Sexp;

use super::codec;
use super::wire::{self, PacketHeader, DT_BYTESTREAM, DT_INT, DT_SEXP, DT_STRING};

/// Command ids understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandId {
    /// Authenticate; argument is `"user\npassword"`, with the password
    /// run through the negotiated cipher.
    Login = 0x001,
    /// Evaluate an expression, discarding the result.
    VoidEval = 0x002,
    /// Evaluate an expression and return its value.
    Eval = 0x003,
    /// Ask the server to shut down.
    Shutdown = 0x004,
    /// Open a file on the server for reading.
    OpenFile = 0x010,
    /// Create (truncate) a file on the server for writing.
    CreateFile = 0x011,
    /// Close the currently open file.
    CloseFile = 0x012,
    /// Read the next chunk of the open file.
    ReadFile = 0x013,
    /// Append a chunk to the open file.
    WriteFile = 0x014,
    /// Delete a file on the server.
    RemoveFile = 0x015,
    /// Assign a value to a symbol in the global environment.
    AssignSexp = 0x021,
    /// Select the server-side string encoding.
    SetEncoding = 0x082,
}

/// One request argument.
///
/// Each kind maps to one parameter block on the wire.
#[derive(Debug, Clone)]
pub enum Arg {
    /// UTF-8 string; sent NUL-terminated and zero-padded to a 4-byte
    /// boundary.
    String(String),

    /// S-expression; sent in its encoded form.
    Sexp(Sexp),

    /// Opaque bytes; sent verbatim.
    Bytes(Vec<u8>),

    /// 32-bit integer; sent little-endian.
    Int(i32),
}

impl Arg {
    fn data_type(&self) -> u8 {
        match self {
            Arg::String(_) => DT_STRING,
            Arg::Sexp(_) => DT_SEXP,
            Arg::Bytes(_) => DT_BYTESTREAM,
            Arg::Int(_) => DT_INT,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Arg::String(s) => wire::padded(s.len() + 1),
            Arg::Sexp(v) => codec::encoded_len(v),
            Arg::Bytes(b) => b.len(),
            Arg::Int(_) => 4,
        }
    }
}

/// Build a complete request packet: packet header plus framed arguments.
pub fn encode_request(command: CommandId, args: &[Arg]) -> BytesMut {
    let body_len: usize = args
        .iter()
        .map(|arg| {
            let len = arg.payload_len();
            wire::header_size(len) + len
        })
        .sum();

    let mut buf = BytesMut::with_capacity(wire::PACKET_HEADER_LEN + body_len);
    PacketHeader::new(command as u32, body_len as u64).encode(&mut buf);

    for arg in args {
        let len = arg.payload_len();
        wire::put_header(&mut buf, arg.data_type(), len);
        match arg {
            Arg::String(s) => {
                buf.put_slice(s.as_bytes());
                // Terminator plus padding in one stroke.
                buf.put_bytes(0, len - s.len());
            }
            Arg::Sexp(v) => codec::encode_sexp(v, &mut buf),
            Arg::Bytes(b) => buf.put_slice(b),
            Arg::Int(i) => buf.put_i32_le(*i),
        }
    }

    buf
}
