//! Error types for the multifile engine.
//!
//! One variant per failure domain named in the format spec. Every error is
//! surfaced to the caller immediately; the engine never retries.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The file does not exist and `create_if_missing` was false.
    #[error("multifile not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but its first 4 bytes are not the magic.
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    /// The serialized Index is internally inconsistent.
    #[error("corrupted index: {0}")]
    Corrupted(String),

    /// A read or write returned fewer bytes than requested.
    #[error("short {op} at offset {offset}: expected {expected} bytes, got {actual}")]
    IoShort {
        op: &'static str,
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// A seek to an absolute offset failed.
    #[error("seek to {offset} failed: {source}")]
    IoSeek {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted on a closed Multifile.
    #[error("operation on a closed multifile")]
    Closed,

    /// The allocator could not find a gap for the requested length.
    #[error("no gap found for {0} bytes")]
    OutOfSpace(u64),

    /// A write would leave a subfile at zero length. `length == 0` doubles
    /// as the lookup-miss sentinel, so a zero-length entry could never be
    /// read back; zero-length subfiles are unsupported.
    #[error("subfile {0:?} would have zero length")]
    EmptySubfile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
