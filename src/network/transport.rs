//! Transport I/O
//!
//! The primitives the framing layer is built on: fill a buffer exactly,
//! discard an exact byte count, and write a buffer fully. No protocol
//! knowledge lives here.

use std::io::{ErrorKind, Read, Write};

use crate::error::{QapError, Result};

/// Chunk size used when draining bytes that will be discarded.
const SKIP_CHUNK_SIZE: usize = 8 * 1024;

/// Fill `buf` completely, looping over short reads.
///
/// Retries on `Interrupted`. Fails with [`QapError::Closed`] if the peer
/// ends the stream before `buf` is full; a partially filled buffer is
/// never returned as success.
pub fn read_exact_buf<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = match reader.read(&mut buf[filled..]) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(QapError::Io(err)),
        };
        if read == 0 {
            return Err(QapError::Closed);
        }
        filled += read;
    }
    Ok(())
}

/// Read and discard exactly `n` bytes.
pub fn skip<R: Read>(reader: &mut R, n: u64) -> Result<()> {
    let mut chunk = [0u8; SKIP_CHUNK_SIZE];
    let mut remaining = n;
    while remaining > 0 {
        let take = (chunk.len() as u64).min(remaining) as usize;
        read_exact_buf(reader, &mut chunk[..take])?;
        remaining -= take as u64;
    }
    Ok(())
}

/// Write all of `buf` and flush.
pub fn write_all<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    writer.write_all(buf)?;
    writer.flush()?;
    Ok(())
}
