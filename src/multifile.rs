//! Multifile — the top-level container. Opens or creates the backing file,
//! validates the magic header, bootstraps the [`Index`], and exposes the
//! subfile CRUD + mmap surface. Coordinates relocation when an entry must
//! grow past its neighbour.
//!
//! # File layout
//!
//! ```text
//! offset  bytes   meaning
//! 0       4       magic = 53 6F 66 2B   ("Sof+")
//! 4       8       u64 BE: byte offset of the live serialized Index chunk
//! 12      ...     data region: ranges and gaps, arbitrary order
//! ```

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::codec;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::index::{Index, DATA_START, TMP_RESIZE_NAME};

/// On-disk magic identifying a multifile container: `"Sof+"`.
pub const MAGIC: [u8; 4] = *b"Sof+";

/// Buffer size used for the byte-by-byte copy and zero-fill loops during
/// relocation. Not part of the on-disk format.
const COPY_BUF_SIZE: usize = 64 * 1024;

/// A single-file container hosting named, growable byte chunks.
///
/// State machine: `Open -> Closed`; no operations are permitted once
/// closed, and there is no reopen — construct a new `Multifile`.
pub struct Multifile {
    file: Option<File>,
    index: Index,
}

impl Multifile {
    /// Open an existing multifile, or create one at `path` if it is
    /// missing and `create_if_missing` is true.
    pub fn open<P: AsRef<Path>>(path: P, create_if_missing: bool) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            if !create_if_missing {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            Self::initialize_empty(path)?;
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        codec::seek(&mut file, 0)?;
        let found: [u8; 4] = codec::read_exact(&mut file, 4)?
            .try_into()
            .expect("read_exact(4) returns exactly 4 bytes");
        if found != MAGIC {
            return Err(Error::BadMagic { expected: MAGIC, found });
        }

        let pointer = codec::read_u64(&mut file)?;
        codec::seek(&mut file, pointer)?;
        let index = Index::read(&mut file)?;

        Ok(Self { file: Some(file), index })
    }

    /// Write the empty-file bootstrap: magic, the index pointer (pointing
    /// at [`DATA_START`]), and an empty serialized Index (`count = 0`).
    fn initialize_empty(path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        codec::write_all(&mut file, &MAGIC)?;
        codec::write_u64(&mut file, DATA_START)?;
        codec::seek(&mut file, DATA_START)?;
        codec::write_u64(&mut file, 0)?;
        file.sync_all().map_err(Error::Io)
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(Error::Closed)
    }

    /// Look up `name`, creating, growing, or relocating it so its range
    /// holds at least `min_length` bytes. The Index is serialized before
    /// this returns whenever it mutated.
    fn get_or_grow(&mut self, name: &str, min_length: u64) -> Result<Entry> {
        let existing = self.index.lookup(name);

        let entry = if !existing.exists() {
            let created = self.index.create(name.to_string(), min_length);
            self.index.write_to_disk(self.file_mut()?)?;
            created
        } else if existing.length >= min_length {
            existing
        } else {
            let mut entry = existing;
            if self.index.resize_in_place(&mut entry, min_length) {
                self.index.write_to_disk(self.file_mut()?)?;
                entry
            } else {
                self.relocate(entry, min_length)?
            }
        };

        self.ensure_file_length(entry.end())?;
        Ok(entry)
    }

    /// Move `old`'s bytes into a freshly allocated range sized
    /// `min_length`, zero-filling the grown tail, then rename the
    /// temporary entry over the old name.
    fn relocate(&mut self, old: Entry, min_length: u64) -> Result<Entry> {
        let mut tmp = self.index.create(TMP_RESIZE_NAME, min_length);
        self.ensure_file_length(tmp.end())?;

        self.copy_range(old.start, tmp.start, old.length)?;
        self.zero_range(tmp.start + old.length, min_length - old.length)?;

        self.index.remove(&old);
        self.index.rename(&mut tmp, old.name);
        self.index.write_to_disk(self.file_mut()?)?;
        self.sync()?;

        Ok(tmp)
    }

    /// Grow the physical file to at least `min_len` bytes. Never shrinks.
    /// Needed so [`Multifile::manipulate`] can mmap a range that was only
    /// just allocated in the Index and may not yet be backed by real bytes.
    fn ensure_file_length(&mut self, min_len: u64) -> Result<()> {
        let file = self.file_mut()?;
        let current = file.metadata().map_err(Error::Io)?.len();
        if current < min_len {
            file.set_len(min_len).map_err(Error::Io)?;
        }
        Ok(())
    }

    fn copy_range(&mut self, src: u64, dst: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let chunk_size = COPY_BUF_SIZE.min(len as usize) as u64;
        let mut remaining = len;
        let mut src_off = src;
        let mut dst_off = dst;
        while remaining > 0 {
            let chunk = remaining.min(chunk_size) as usize;
            let file = self.file_mut()?;
            codec::seek(file, src_off)?;
            let data = codec::read_exact(file, chunk)?;
            codec::seek(file, dst_off)?;
            codec::write_all(file, &data)?;
            src_off += chunk as u64;
            dst_off += chunk as u64;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    fn zero_range(&mut self, start: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let buf = vec![0u8; COPY_BUF_SIZE.min(len as usize)];
        let file = self.file_mut()?;
        codec::seek(file, start)?;
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            codec::write_all(file, &buf[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file_mut()?.sync_all().map_err(Error::Io)
    }

    /// Read the complete contents of `name`, or `None` if no such subfile
    /// exists.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let entry = self.index.lookup(name);
        if !entry.exists() {
            return Ok(None);
        }
        let file = self.file_mut()?;
        codec::seek(file, entry.start)?;
        Ok(Some(codec::read_exact(file, entry.length as usize)?))
    }

    /// Read up to `count` bytes of `name` starting at `offset`. Returns
    /// `min(count, entry.length - offset)` bytes — empty if `name` does
    /// not exist or `offset` is at or past the entry's length.
    pub fn read_at(&mut self, name: &str, offset: u64, count: u64) -> Result<Vec<u8>> {
        let entry = self.index.lookup(name);
        if !entry.exists() || offset >= entry.length {
            return Ok(Vec::new());
        }
        let to_read = count.min(entry.length - offset);
        let file = self.file_mut()?;
        codec::seek(file, entry.start + offset)?;
        codec::read_exact(file, to_read as usize)
    }

    /// Write `bytes` at `offset` within `name`, creating or growing the
    /// subfile as needed. Flushes the underlying file before returning.
    ///
    /// Zero-length subfiles are unsupported (see [`Error::EmptySubfile`]):
    /// `offset == 0 && bytes.is_empty()` on a name that does not yet exist
    /// is rejected rather than silently stored as an unreadable entry. The
    /// same call against an *existing* name is a true no-op — zero bytes
    /// are written and the subfile's prior contents are left untouched.
    pub fn write(&mut self, name: &str, offset: u64, bytes: &[u8]) -> Result<()> {
        let min_length = offset + bytes.len() as u64;
        if min_length == 0 && !self.index.lookup(name).exists() {
            return Err(Error::EmptySubfile(name.to_string()));
        }
        let entry = self.get_or_grow(name, min_length)?;
        {
            let file = self.file_mut()?;
            codec::seek(file, entry.start + offset)?;
            codec::write_all(file, bytes)?;
        }
        self.sync()
    }

    /// Memory-map `name`'s range (growing it to `min_length` first if
    /// needed) and invoke `f` with the writable slice. The mapping is
    /// unmapped on every exit path, including a panic unwinding out of `f`.
    ///
    /// Does not flush afterward; writeback of mmap-dirtied pages is left
    /// to the OS unless the caller calls [`Multifile::flush`] explicitly.
    pub fn manipulate<T>(
        &mut self,
        name: &str,
        min_length: u64,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Result<T> {
        if min_length == 0 && !self.index.lookup(name).exists() {
            return Err(Error::EmptySubfile(name.to_string()));
        }
        let entry = self.get_or_grow(name, min_length)?;
        let file = self.file_mut()?;

        // SAFETY: the mapped range is backed by a file we hold open and
        // exclusively own for the lifetime of this Multifile; no other
        // process or thread is assumed to touch it concurrently.
        let mut mmap = unsafe {
            memmap2::MmapOptions::new()
                .offset(entry.start)
                .len(entry.length as usize)
                .map_mut(&*file)
        }
        .map_err(Error::Io)?;

        Ok(f(&mut mmap[..]))
    }

    /// Serialize the Index and flush the underlying file.
    pub fn flush(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        self.index.write_to_disk(file)?;
        file.sync_all().map_err(Error::Io)
    }

    /// Flush, then release the file handle. Any subsequent operation on
    /// this `Multifile` fails with [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.file = None;
        Ok(())
    }

    /// Whether this Multifile has been [`Multifile::close`]d.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}
