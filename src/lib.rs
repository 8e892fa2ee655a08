//! # softie — embedded multifile storage engine
//!
//! A single-file container that hosts a bounded number (target ~10^5) of
//! independently addressable, variable-length, growable byte chunks
//! ("subfiles"). Each subfile is identified by a string name and can be
//! read in slices, overwritten at arbitrary offsets, extended, or
//! memory-mapped for in-place mutation.
//!
//! # Format guarantees
//! - The magic `"Sof+"` and the 8-byte index pointer at offset 4 are the
//!   only stable anchors; everything else is relocatable.
//! - The Index is itself stored as one of the chunks it manages — the
//!   self-hosting bootstrap described in [`index`].
//! - All numeric fields are big-endian; this is frozen.
//! - Names beginning with `$$` are reserved for the engine.
//!
//! # Non-goals
//! No crash-consistency guarantees beyond ordered flushes, no concurrent
//! multi-writer access, no block-level checksums, no encryption, no
//! free-list coalescing beyond what the linear gap-fit scan naturally
//! yields. See each module's documentation for the invariants it owns.
//!
//! ```no_run
//! use softie::Multifile;
//!
//! let mut mf = Multifile::open("index.sfm", true)?;
//! mf.write("greeting", 0, b"hello")?;
//! assert_eq!(mf.read("greeting")?, Some(b"hello".to_vec()));
//! mf.close()?;
//! # Ok::<(), softie::Error>(())
//! ```

pub mod codec;
pub mod entry;
pub mod error;
pub mod index;
pub mod multifile;

pub use entry::Entry;
pub use error::{Error, Result};
pub use index::Index;
pub use multifile::Multifile;
