//! Low-level wire primitives
//!
//! The two fixed layouts everything else is built from:
//!
//! Packet header (16 bytes, all fields little-endian):
//! ```text
//! +----------------+----------------+----------------+----------------+
//! | command (u32)  | length low u32 | data offset u32| length high u32|
//! +----------------+----------------+----------------+----------------+
//! ```
//! The body length is a 64-bit value split across two fields. The data
//! offset is always zero in this protocol revision.
//!
//! Block header (4 or 8 bytes):
//! ```text
//! +------+------------------+          +------+--------------------------+
//! | type | length (3B LE)   |    or    | type | length (7B LE)           |
//! +------+------------------+          | 0x40 |                          |
//!                                      +------+--------------------------+
//! ```
//! The long form is used when the payload length exceeds
//! [`LARGE_DATA_THRESHOLD`]; the `0x40` bit in the type byte marks it.
//! Declared lengths always cover the payload only, never the header itself.

use bytes::{BufMut, BytesMut};

use crate::error::{QapError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Size of the fixed packet header.
pub const PACKET_HEADER_LEN: usize = 16;

/// Type-byte flag: the header carries a 7-byte length.
pub const FLAG_LARGE: u8 = 0x40;

/// Type-byte flag (value blocks only): an attribute list precedes the
/// payload.
pub const FLAG_HAS_ATTR: u8 = 0x80;

/// Largest payload length encodable in the 3-byte short form. Anything
/// longer switches to the 8-byte header, on encode and decode alike.
pub const LARGE_DATA_THRESHOLD: usize = 0x00FF_FFF0;

// ----- Data-type tags (command parameter blocks) -----

/// 32-bit little-endian integer parameter.
pub const DT_INT: u8 = 1;
/// NUL-terminated string parameter, zero-padded to a 4-byte multiple.
pub const DT_STRING: u8 = 4;
/// Uninterpreted byte stream parameter.
pub const DT_BYTESTREAM: u8 = 5;
/// Encoded S-expression parameter.
pub const DT_SEXP: u8 = 10;

// =============================================================================
// Block headers
// =============================================================================

/// A parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Type byte with the large-length flag stripped. The attribute flag
    /// is preserved for the caller to interpret.
    pub ty: u8,
    /// Declared payload length in bytes.
    pub len: usize,
    /// Bytes the header itself occupied: 4, or 8 for the long form.
    pub size: usize,
}

/// Bytes a block header for `len` payload bytes will occupy.
pub fn header_size(len: usize) -> usize {
    if len > LARGE_DATA_THRESHOLD {
        8
    } else {
        4
    }
}

/// Round up to a 4-byte multiple.
pub fn padded(n: usize) -> usize {
    (n + 3) & !3
}

/// Append a block header for a payload of `len` bytes.
pub fn put_header(buf: &mut BytesMut, ty: u8, len: usize) {
    if len > LARGE_DATA_THRESHOLD {
        buf.put_u8(ty | FLAG_LARGE);
        let len = len as u64;
        for shift in 0..7 {
            buf.put_u8((len >> (8 * shift)) as u8);
        }
    } else {
        buf.put_u8(ty);
        buf.put_u8(len as u8);
        buf.put_u8((len >> 8) as u8);
        buf.put_u8((len >> 16) as u8);
    }
}

/// Parse the block header at `*pos`, advancing `*pos` past it.
///
/// Does not require (or check) that the payload follows in the slice;
/// streaming callers read the payload separately.
pub fn parse_header(data: &[u8], pos: &mut usize) -> Result<BlockHeader> {
    let start = *pos;
    let raw_ty = *data
        .get(start)
        .ok_or_else(|| QapError::Protocol("truncated block header".into()))?;

    let (len, size) = if raw_ty & FLAG_LARGE != 0 {
        let bytes = data
            .get(start + 1..start + 8)
            .ok_or_else(|| QapError::Protocol("truncated block header".into()))?;
        let mut len = 0u64;
        for (shift, b) in bytes.iter().enumerate() {
            len |= (*b as u64) << (8 * shift);
        }
        (len as usize, 8)
    } else {
        let bytes = data
            .get(start + 1..start + 4)
            .ok_or_else(|| QapError::Protocol("truncated block header".into()))?;
        let len = bytes[0] as usize | (bytes[1] as usize) << 8 | (bytes[2] as usize) << 16;
        (len, 4)
    };

    *pos = start + size;
    Ok(BlockHeader {
        ty: raw_ty & !FLAG_LARGE,
        len,
        size,
    })
}

/// Parse the block header at `*pos` and check its declared payload fits
/// within the slice, advancing `*pos` past the header.
pub fn get_header(data: &[u8], pos: &mut usize) -> Result<BlockHeader> {
    let start = *pos;
    let header = parse_header(data, pos)?;
    if start + header.size + header.len > data.len() {
        *pos = start;
        return Err(QapError::Protocol(format!(
            "block declares {} payload bytes but only {} remain",
            header.len,
            data.len() - start - header.size
        )));
    }
    Ok(header)
}

// =============================================================================
// Packet headers
// =============================================================================

/// The fixed 16-byte header framing every request and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Command id on requests; status word on responses.
    pub command: u32,
    /// Body length in bytes, reassembled from the split low/high fields.
    pub body_len: u64,
    /// Offset of the body within the data part. Always zero in this
    /// protocol revision; responses with any other value are rejected.
    pub data_offset: u32,
}

impl PacketHeader {
    pub fn new(command: u32, body_len: u64) -> Self {
        Self {
            command,
            body_len,
            data_offset: 0,
        }
    }

    /// Append the 16-byte wire form.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.command);
        buf.put_u32_le(self.body_len as u32);
        buf.put_u32_le(self.data_offset);
        buf.put_u32_le((self.body_len >> 32) as u32);
    }

    /// Parse the 16-byte wire form.
    pub fn decode(bytes: &[u8; PACKET_HEADER_LEN]) -> Self {
        let field = |i: usize| {
            u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
        };
        let low = field(4) as u64;
        let high = field(12) as u64;
        Self {
            command: field(0),
            body_len: low | high << 32,
            data_offset: field(8),
        }
    }
}
