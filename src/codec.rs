//! Byte codec — fixed-width big-endian integers and length-prefixed strings
//! on a seekable file handle.
//!
//! # Wire format
//!
//! ```text
//! u64   8 bytes, big-endian, most-significant byte first
//! str   u64 length prefix, then that many UTF-8 bytes
//! ```
//!
//! The codec owns no buffering beyond what the underlying handle provides;
//! callers are responsible for flushing before observing on-disk state. All
//! failures — short read, short write, a seek past what the OS considers
//! valid — surface as [`Error`] with the offending offset embedded.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Read a big-endian u64 from the current position.
pub fn read_u64<R: Read + Seek>(r: &mut R) -> Result<u64> {
    let offset = r.stream_position()?;
    r.read_u64::<BigEndian>().map_err(|e| io_short_or(e, "read_u64", offset, 8))
}

/// Write a big-endian u64 at the current position.
pub fn write_u64<W: Write + Seek>(w: &mut W, value: u64) -> Result<()> {
    let offset = w.stream_position()?;
    w.write_u64::<BigEndian>(value)
        .map_err(|e| io_short_or(e, "write_u64", offset, 8))
}

/// Read exactly `n` bytes from the current position.
pub fn read_exact<R: Read + Seek>(r: &mut R, n: usize) -> Result<Vec<u8>> {
    let offset = r.stream_position()?;
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)
        .map_err(|e| io_short_or(e, "read_exact", offset, n))?;
    Ok(buf)
}

/// Write all of `bytes` at the current position.
pub fn write_all<W: Write + Seek>(w: &mut W, bytes: &[u8]) -> Result<()> {
    let offset = w.stream_position()?;
    w.write_all(bytes)
        .map_err(|e| io_short_or(e, "write_all", offset, bytes.len()))
}

/// Read a u64 length prefix followed by that many UTF-8 bytes.
pub fn read_len_prefixed_string<R: Read + Seek>(r: &mut R) -> Result<String> {
    let len = read_u64(r)?;
    let bytes = read_exact(r, len as usize)?;
    String::from_utf8(bytes).map_err(|e| Error::Corrupted(format!("name is not valid utf-8: {e}")))
}

/// Write a u64 length prefix followed by the UTF-8 bytes of `s`.
pub fn write_len_prefixed_string<W: Write + Seek>(w: &mut W, s: &str) -> Result<()> {
    write_u64(w, s.len() as u64)?;
    write_all(w, s.as_bytes())
}

/// Seek to an absolute offset.
pub fn seek<S: Seek>(s: &mut S, offset: u64) -> Result<u64> {
    s.seek(SeekFrom::Start(offset))
        .map_err(|source| Error::IoSeek { offset, source })
}

/// Seek to the end of the stream, returning the resulting offset.
pub fn seek_end<S: Seek>(s: &mut S) -> Result<u64> {
    s.seek(SeekFrom::End(0))
        .map_err(|source| Error::IoSeek { offset: u64::MAX, source })
}

/// Classify an I/O error as a short-read/short-write (when the OS reports
/// `UnexpectedEof` or similar) or pass it through as a generic I/O error.
fn io_short_or(e: std::io::Error, op: &'static str, offset: u64, expected: usize) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::IoShort { op, offset, expected, actual: 0 }
    } else {
        Error::Io(e)
    }
}
