//! Protocol Module
//!
//! The QAP1 wire protocol: value encoding, request framing, and response
//! parsing.
//!
//! ## Packet Format
//! ```text
//! ┌─────────────┬─────────────┬─────────────┬─────────────┬──────────┐
//! │ command (4) │ len low (4) │ offset (4)  │ len high (4)│   body   │
//! └─────────────┴─────────────┴─────────────┴─────────────┴──────────┘
//! ```
//!
//! The body is a concatenation of parameter blocks, each framed as
//! `[type byte][3-byte length]`, or `[type|0x40][7-byte length]` once the
//! length exceeds `0x00FFFFF0`. S-expression parameters nest the same
//! header scheme recursively, with the `0x80` type bit marking a leading
//! attribute block.
//!
//! ### Parameter data types
//! - 1:  32-bit integer
//! - 4:  NUL-terminated string
//! - 5:  opaque byte stream
//! - 10: encoded S-expression
//!
//! On responses the command field is a status word: low nibble 1 means
//! success, otherwise bits 24-30 carry a server error code.

mod codec;
mod command;
mod response;
mod wire;

pub use codec::{
    decode_sexp, encode_sexp, encoded_len, MAX_DECODE_DEPTH, XT_ARRAY_BOOL, XT_ARRAY_DOUBLE,
    XT_ARRAY_INT, XT_ARRAY_STR, XT_LIST_NOTAG, XT_LIST_TAG, XT_NULL, XT_RAW, XT_SYMNAME,
    XT_VECTOR,
};
pub use command::{encode_request, Arg, CommandId};
pub use response::{
    error_text, read_response, read_stream_response, Parameter, ERR_ACCESS_DENIED,
    ERR_AUTH_FAILED, ERR_CONN_BROKEN, ERR_CRYPT_ERROR, ERR_CTRL_CLOSED, ERR_DATA_OVERFLOW,
    ERR_DETACH_FAILED, ERR_DISABLED, ERR_INVALID_CMD, ERR_INVALID_PAR, ERR_IO_ERROR,
    ERR_NOT_OPEN, ERR_OBJECT_TOO_BIG, ERR_OUT_OF_MEM, ERR_R_ERROR, ERR_SECURITY_CLOSE,
    ERR_SESSION_BUSY, ERR_UNAVAILABLE, ERR_UNKNOWN_CMD, ERR_UNSUPPORTED_CMD,
};
pub use wire::{
    BlockHeader, PacketHeader, DT_BYTESTREAM, DT_INT, DT_SEXP, DT_STRING, FLAG_HAS_ATTR,
    FLAG_LARGE, LARGE_DATA_THRESHOLD, PACKET_HEADER_LEN,
};
