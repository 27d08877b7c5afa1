//! S-expression codec
//!
//! Encoding and decoding between [`Sexp`] values and their wire form.
//!
//! ## Wire Format
//!
//! ### Value block
//! ```text
//! ┌─────────┬─────────────┬───────────────────────┬─────────────────┐
//! │ tag (1) │ len (3 / 7) │ attribute block (opt) │     payload     │
//! └─────────┴─────────────┴───────────────────────┴─────────────────┘
//! ```
//!
//! The tag byte carries two flag bits: `0x40` selects the 7-byte length
//! form, `0x80` announces a leading attribute block. The declared length
//! covers the attribute block plus the payload. The attribute block is a
//! complete tagged-list value block of its own.
//!
//! ### Payload by tag
//! - NULL:      empty
//! - INT:       4 bytes little-endian per element
//! - DOUBLE:    8 bytes little-endian per element
//! - BOOL:      element count (4 bytes LE) + 1 byte per element + padding
//! - STR:       each element UTF-8 + NUL; NA is the single byte 0xFF
//! - VECTOR:    concatenated child value blocks
//! - LIST_TAG:  per entry, a child value block then a SYMNAME key block
//! - SYMNAME:   UTF-8 + NUL
//! - anything else: opaque bytes, preserved verbatim
//!
//! Encoding is two-pass: a sizing pass computes every block's declared
//! length, then a writing pass emits bytes directly, so no intermediate
//! buffers are allocated for nested values.

use bytes::{BufMut, BytesMut};

use crate::error::{QapError, Result};
use crate::sexp::{is_na_real, Logical, Sexp, SexpData, NA_INTEGER};

use super::wire::{self, FLAG_HAS_ATTR, FLAG_LARGE};

// =============================================================================
// Value type tags
// =============================================================================

/// The R NULL value.
pub const XT_NULL: u8 = 0;
/// Generic vector (untagged list).
pub const XT_VECTOR: u8 = 16;
/// Symbol name.
pub const XT_SYMNAME: u8 = 19;
/// Untagged pairlist; decoded identically to `XT_VECTOR`.
pub const XT_LIST_NOTAG: u8 = 20;
/// Tagged pairlist; also the carrier for attribute maps.
pub const XT_LIST_TAG: u8 = 21;
/// Integer vector.
pub const XT_ARRAY_INT: u8 = 32;
/// Double vector.
pub const XT_ARRAY_DOUBLE: u8 = 33;
/// Character vector.
pub const XT_ARRAY_STR: u8 = 34;
/// Logical (tri-state) vector.
pub const XT_ARRAY_BOOL: u8 = 36;
/// Byte vector. Carried opaquely, like every tag without a dedicated
/// decode rule.
pub const XT_RAW: u8 = 37;

/// Mask clearing the large-length and attribute flags from a tag byte.
const TAG_MASK: u8 = !(FLAG_LARGE | FLAG_HAS_ATTR);

// =============================================================================
// Sizing
// =============================================================================

/// Total encoded size of a value: header, attribute block and payload.
pub fn encoded_len(value: &Sexp) -> usize {
    let content = content_len(value);
    wire::header_size(content) + content
}

/// Declared length of a value block: attribute block plus payload.
fn content_len(value: &Sexp) -> usize {
    attributes_len(value.attributes()) + payload_len(value.data())
}

/// Size of the attribute block including its own header, or 0 if there
/// are no attributes.
fn attributes_len(attributes: &[(String, Sexp)]) -> usize {
    if attributes.is_empty() {
        return 0;
    }
    let entries = tagged_entries_len(attributes);
    wire::header_size(entries) + entries
}

fn tagged_entries_len(entries: &[(String, Sexp)]) -> usize {
    entries
        .iter()
        .map(|(name, value)| encoded_len(value) + symbol_block_len(name))
        .sum()
}

fn symbol_block_len(name: &str) -> usize {
    let payload = name.len() + 1;
    wire::header_size(payload) + payload
}

fn payload_len(data: &SexpData) -> usize {
    match data {
        SexpData::Null => 0,
        SexpData::Integers(v) | SexpData::Dates(v) => 4 * v.len(),
        SexpData::Doubles(v) => 8 * v.len(),
        SexpData::Logicals(v) => 4 + wire::padded(v.len()),
        SexpData::Strings(v) => v.iter().map(|s| string_entry_len(s.as_deref())).sum(),
        SexpData::List(children) => children.iter().map(encoded_len).sum(),
        SexpData::TaggedList(entries) => tagged_entries_len(entries),
        SexpData::Symbol(name) => name.len() + 1,
        SexpData::Raw { data, .. } => data.len(),
    }
}

fn string_entry_len(s: Option<&str>) -> usize {
    match s {
        // NA is the single content byte 0xFF plus the terminator.
        None => 2,
        // A literal starting with 0xFF gets an extra 0xFF so it cannot be
        // mistaken for NA.
        Some(s) => s.len() + 1 + usize::from(s.as_bytes().first() == Some(&0xFF)),
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Append the complete wire form of a value.
pub fn encode_sexp(value: &Sexp, buf: &mut BytesMut) {
    let mut tag = type_tag(value.data());
    if value.has_attributes() {
        tag |= FLAG_HAS_ATTR;
    }
    wire::put_header(buf, tag, content_len(value));
    if value.has_attributes() {
        encode_attributes(value.attributes(), buf);
    }
    encode_payload(value.data(), buf);
}

fn type_tag(data: &SexpData) -> u8 {
    match data {
        SexpData::Null => XT_NULL,
        SexpData::Integers(_) | SexpData::Dates(_) => XT_ARRAY_INT,
        SexpData::Doubles(_) => XT_ARRAY_DOUBLE,
        SexpData::Logicals(_) => XT_ARRAY_BOOL,
        SexpData::Strings(_) => XT_ARRAY_STR,
        SexpData::List(_) => XT_VECTOR,
        SexpData::TaggedList(_) => XT_LIST_TAG,
        SexpData::Symbol(_) => XT_SYMNAME,
        SexpData::Raw { ty, .. } => ty & TAG_MASK,
    }
}

fn encode_attributes(attributes: &[(String, Sexp)], buf: &mut BytesMut) {
    wire::put_header(buf, XT_LIST_TAG, tagged_entries_len(attributes));
    encode_tagged_entries(attributes, buf);
}

/// Tagged-list entries go on the wire as the value block first, then the
/// key as a symbol block.
fn encode_tagged_entries(entries: &[(String, Sexp)], buf: &mut BytesMut) {
    for (name, value) in entries {
        encode_sexp(value, buf);
        encode_symbol_block(name, buf);
    }
}

fn encode_symbol_block(name: &str, buf: &mut BytesMut) {
    wire::put_header(buf, XT_SYMNAME, name.len() + 1);
    buf.put_slice(name.as_bytes());
    buf.put_u8(0);
}

fn encode_payload(data: &SexpData, buf: &mut BytesMut) {
    match data {
        SexpData::Null => {}
        SexpData::Integers(v) | SexpData::Dates(v) => {
            for x in v {
                buf.put_i32_le(*x);
            }
        }
        SexpData::Doubles(v) => {
            for x in v {
                buf.put_f64_le(*x);
            }
        }
        SexpData::Logicals(v) => {
            buf.put_u32_le(v.len() as u32);
            for x in v {
                buf.put_u8(x.to_wire());
            }
            buf.put_bytes(0, wire::padded(v.len()) - v.len());
        }
        SexpData::Strings(v) => {
            for s in v {
                match s.as_deref() {
                    None => {
                        buf.put_u8(0xFF);
                        buf.put_u8(0);
                    }
                    Some(s) => {
                        if s.as_bytes().first() == Some(&0xFF) {
                            buf.put_u8(0xFF);
                        }
                        buf.put_slice(s.as_bytes());
                        buf.put_u8(0);
                    }
                }
            }
        }
        SexpData::List(children) => {
            for child in children {
                encode_sexp(child, buf);
            }
        }
        SexpData::TaggedList(entries) => encode_tagged_entries(entries, buf),
        SexpData::Symbol(name) => {
            buf.put_slice(name.as_bytes());
            buf.put_u8(0);
        }
        SexpData::Raw { data, .. } => buf.put_slice(data),
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Upper bound on container nesting while decoding (vectors, tagged lists
/// and attribute blocks all count). Deeper input is treated as a protocol
/// fault rather than followed down the stack.
pub const MAX_DECODE_DEPTH: usize = 128;

/// Decode one value occupying the whole of `data`.
///
/// Fails if the value's declared length leaves bytes of `data` unconsumed.
pub fn decode_sexp(data: &[u8]) -> Result<Sexp> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;
    if pos != data.len() {
        return Err(QapError::Protocol(format!(
            "{} trailing bytes after value",
            data.len() - pos
        )));
    }
    Ok(value)
}

/// Decode the value block at `*pos`, advancing `*pos` past it.
///
/// Children are decoded against a slice truncated to the parent's declared
/// end, so a nested block can never read past the region its parent
/// declared for it. Nesting past [`MAX_DECODE_DEPTH`] levels is rejected.
fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<Sexp> {
    if depth >= MAX_DECODE_DEPTH {
        return Err(QapError::Protocol(format!(
            "value nesting exceeds {} levels",
            MAX_DECODE_DEPTH
        )));
    }
    let header = wire::get_header(data, pos)?;
    let end = *pos + header.len;
    let tag = header.ty & !FLAG_HAS_ATTR;

    let mut attributes = Vec::new();
    if header.ty & FLAG_HAS_ATTR != 0 {
        let attr = decode_value(&data[..end], pos, depth + 1)?;
        match attr.into_data() {
            SexpData::TaggedList(entries) => attributes = entries,
            other => {
                return Err(QapError::Protocol(format!(
                    "attribute block is not a tagged list (tag {})",
                    type_tag(&other)
                )))
            }
        }
    }

    let payload = decode_payload(tag, data, pos, end, depth)?;
    if *pos != end {
        return Err(QapError::Protocol(format!(
            "value of tag {} consumed {} bytes of a declared {}",
            tag,
            header.len - (end - *pos),
            header.len
        )));
    }

    // An integer or double vector classed as "Date" is a date vector.
    let payload = match payload {
        SexpData::Integers(v) if is_date_class(&attributes) => SexpData::Dates(v),
        SexpData::Doubles(v) if is_date_class(&attributes) => SexpData::Dates(
            v.iter()
                .map(|&d| if is_na_real(d) { NA_INTEGER } else { d as i32 })
                .collect(),
        ),
        other => other,
    };

    Ok(Sexp::new(payload).with_attributes(attributes))
}

fn decode_payload(
    tag: u8,
    data: &[u8],
    pos: &mut usize,
    end: usize,
    depth: usize,
) -> Result<SexpData> {
    let region = &data[*pos..end];
    match tag {
        XT_NULL => Ok(SexpData::Null),
        XT_ARRAY_INT => {
            if region.len() % 4 != 0 {
                return Err(QapError::Protocol(format!(
                    "integer payload of {} bytes is not a multiple of 4",
                    region.len()
                )));
            }
            *pos = end;
            Ok(SexpData::Integers(
                region
                    .chunks_exact(4)
                    .map(|c| {
                        let mut b = [0u8; 4];
                        b.copy_from_slice(c);
                        i32::from_le_bytes(b)
                    })
                    .collect(),
            ))
        }
        XT_ARRAY_DOUBLE => {
            if region.len() % 8 != 0 {
                return Err(QapError::Protocol(format!(
                    "double payload of {} bytes is not a multiple of 8",
                    region.len()
                )));
            }
            *pos = end;
            Ok(SexpData::Doubles(
                region
                    .chunks_exact(8)
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b)
                    })
                    .collect(),
            ))
        }
        XT_ARRAY_BOOL => {
            if region.len() < 4 {
                return Err(QapError::Protocol(
                    "logical payload too short for its count field".to_string(),
                ));
            }
            let count =
                u32::from_le_bytes([region[0], region[1], region[2], region[3]]) as usize;
            if count > region.len() - 4 {
                return Err(QapError::Protocol(format!(
                    "logical count {} exceeds {} payload bytes",
                    count,
                    region.len() - 4
                )));
            }
            // Bytes past the declared count are alignment padding.
            *pos = end;
            Ok(SexpData::Logicals(
                region[4..4 + count]
                    .iter()
                    .map(|&b| Logical::from_wire(b))
                    .collect(),
            ))
        }
        XT_ARRAY_STR => {
            let values = decode_strings(region)?;
            *pos = end;
            Ok(SexpData::Strings(values))
        }
        XT_SYMNAME => {
            let name = decode_symbol(region)?;
            *pos = end;
            Ok(SexpData::Symbol(name))
        }
        XT_VECTOR | XT_LIST_NOTAG => {
            let mut children = Vec::new();
            while *pos < end {
                children.push(decode_value(&data[..end], pos, depth + 1)?);
            }
            Ok(SexpData::List(children))
        }
        XT_LIST_TAG => {
            let mut entries = Vec::new();
            while *pos < end {
                let value = decode_value(&data[..end], pos, depth + 1)?;
                let key = decode_value(&data[..end], pos, depth + 1)?;
                match key.into_data() {
                    SexpData::Symbol(name) => entries.push((name, value)),
                    // A NULL key is an unnamed entry.
                    SexpData::Null => entries.push((String::new(), value)),
                    other => {
                        return Err(QapError::Protocol(format!(
                            "tagged list key is not a symbol (tag {})",
                            type_tag(&other)
                        )))
                    }
                }
            }
            Ok(SexpData::TaggedList(entries))
        }
        // Any tag without a decode rule is carried opaquely so it can be
        // re-sent byte-identically.
        other => {
            *pos = end;
            Ok(SexpData::Raw {
                ty: other,
                data: region.to_vec(),
            })
        }
    }
}

/// Split a character-vector payload into entries.
///
/// Each entry runs to its NUL terminator. The content byte 0xFF alone is
/// NA; a leading doubled 0xFF marks a literal that genuinely starts with
/// 0xFF. Bytes after the final terminator are alignment padding from the
/// peer and are dropped; a payload with data but no terminator at all is
/// malformed.
fn decode_strings(region: &[u8]) -> Result<Vec<Option<String>>> {
    let mut values = Vec::new();
    let mut start = 0;
    while start < region.len() {
        let Some(nul) = region[start..].iter().position(|&b| b == 0) else {
            if values.is_empty() {
                return Err(QapError::Protocol(
                    "unterminated string data".to_string(),
                ));
            }
            break;
        };
        let content = &region[start..start + nul];
        values.push(match content {
            [0xFF] => None,
            [0xFF, rest @ ..] => Some(decode_utf8(rest)?.to_string()),
            _ => Some(decode_utf8(content)?.to_string()),
        });
        start += nul + 1;
    }
    Ok(values)
}

fn decode_symbol(region: &[u8]) -> Result<String> {
    let Some(nul) = region.iter().position(|&b| b == 0) else {
        return Err(QapError::Protocol("unterminated symbol name".to_string()));
    };
    // Bytes past the terminator are alignment padding.
    Ok(decode_utf8(&region[..nul])?.to_string())
}

fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| QapError::Protocol(format!("invalid UTF-8 in string data: {}", e)))
}

fn is_date_class(attributes: &[(String, Sexp)]) -> bool {
    attributes.iter().any(|(name, value)| {
        name == "class"
            && value
                .as_strings()
                .is_some_and(|v| v.iter().any(|s| s.as_deref() == Some("Date")))
    })
}
