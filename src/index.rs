//! Index — the in-memory catalog of subfile [`Entry`] records, dual-indexed
//! by name (for lookup) and by start offset (for gap-finding and neighbour
//! queries). Owns the gap-fit allocator and the self-hosting serialization
//! that stores the Index itself as one of the chunks it manages.
//!
//! # Serialized layout
//!
//! ```text
//! count: u64                     number of entries
//! count × {
//!     start:     u64
//!     length:    u64
//!     name_len:  u64
//!     name:      name_len bytes (UTF-8)
//! }
//! ```
//!
//! Entry records are written in by-name order for determinism.

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};
use std::ops::Bound::Excluded;

use crate::codec;
use crate::entry::Entry;
use crate::error::{Error, Result};

/// First byte offset available for chunks — after the 4-byte magic and the
/// 8-byte index pointer.
pub const DATA_START: u64 = 12;

/// Absolute file offset of the index pointer (the u64 giving the
/// self-entry's current start).
pub const INDEX_POINTER_POSITION: u64 = 4;

/// Reserved name of the self-entry whose range holds the serialized Index.
pub const INDEX_NAME: &str = "$$softie-index$$";

/// Reserved name used for the temporary entry during relocation. Never
/// observed by a well-behaved client.
pub const TMP_RESIZE_NAME: &str = "$$softie-tmp-resize";

/// In-memory catalog of live [`Entry`] records plus the allocator.
#[derive(Debug, Default)]
pub struct Index {
    by_name: BTreeMap<String, Entry>,
    /// start -> name, so by-start iteration looks the Entry up in `by_name`.
    by_start: BTreeMap<u64, String>,
    /// Running serialized byte length of the Index: `8` (the count field)
    /// plus every live entry's `header_size()`.
    size: u64,
}

impl Index {
    pub fn new() -> Self {
        Self { by_name: BTreeMap::new(), by_start: BTreeMap::new(), size: 8 }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Current serialized byte length of the Index.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Look up an Entry by name in O(log n).
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name)
    }

    /// Look up an Entry by name, returning a miss sentinel if absent.
    pub fn lookup(&self, name: &str) -> Entry {
        self.get(name).cloned().unwrap_or_else(|| Entry::miss(name))
    }

    /// Forward iteration over live entries in by-start order.
    pub fn iter_by_start(&self) -> impl Iterator<Item = &Entry> {
        self.by_start.values().map(move |name| &self.by_name[name])
    }

    /// The live Entry with the smallest `start` strictly greater than
    /// `entry.start`, if any.
    pub fn upper_bound_by_start(&self, entry: &Entry) -> Option<&Entry> {
        self.by_start
            .range((Excluded(entry.start), std::ops::Bound::Unbounded))
            .next()
            .map(|(_, name)| &self.by_name[name])
    }

    /// Add `entry` to both orderings and account its size.
    ///
    /// Precondition: `entry.name` is not already present. Undefined if
    /// `entry`'s range overlaps an existing one.
    pub fn insert(&mut self, entry: Entry) {
        debug_assert!(
            !self.by_name.contains_key(&entry.name),
            "Index::insert: name {:?} already present",
            entry.name
        );
        self.size += entry.header_size();
        self.by_start.insert(entry.start, entry.name.clone());
        self.by_name.insert(entry.name.clone(), entry);
    }

    /// Like [`Index::insert`] but returns a [`Error::Corrupted`] on a
    /// duplicate name instead of asserting. Used when rebuilding the Index
    /// from an untrusted on-disk form.
    fn insert_checked(&mut self, entry: Entry) -> Result<()> {
        if self.by_name.contains_key(&entry.name) {
            return Err(Error::Corrupted(format!("duplicate entry name {:?}", entry.name)));
        }
        self.insert(entry);
        Ok(())
    }

    /// Remove the live Entry named `entry.name` from both orderings.
    ///
    /// Must be called with an Entry value equal (by name) to a live Entry.
    pub fn remove(&mut self, entry: &Entry) {
        if let Some(existing) = self.by_name.remove(&entry.name) {
            self.by_start.remove(&existing.start);
            self.size -= existing.header_size();
        }
    }

    /// Attempt to grow `entry` to `new_length` without relocating it.
    ///
    /// Returns `false` if the entry's start-ordered neighbour would overlap
    /// the grown range — the caller must relocate instead.
    pub fn resize_in_place(&mut self, entry: &mut Entry, new_length: u64) -> bool {
        if let Some(next) = self.upper_bound_by_start(entry) {
            if next.start < entry.start + new_length {
                return false;
            }
        }
        self.remove(entry);
        entry.length = new_length;
        self.insert(entry.clone());
        true
    }

    /// Remove `entry`, change its name, and re-insert. Used only during
    /// relocation.
    pub fn rename(&mut self, entry: &mut Entry, new_name: impl Into<String>) {
        self.remove(entry);
        entry.name = new_name.into();
        self.insert(entry.clone());
    }

    /// Allocate a new Entry of `length` bytes for `name` via [`Index::find_gap`].
    pub fn create(&mut self, name: impl Into<String>, length: u64) -> Entry {
        let start = self.find_gap(length);
        let entry = Entry::new(name, start, length);
        self.insert(entry.clone());
        entry
    }

    /// First-fit linear scan for a gap of at least `length` bytes at or
    /// after [`DATA_START`]. Deterministic given the current Index state;
    /// never overlaps a live range.
    pub fn find_gap(&self, length: u64) -> u64 {
        let mut last = DATA_START;
        for entry in self.iter_by_start() {
            if last + length <= entry.start {
                return last;
            }
            last = entry.end();
        }
        last
    }

    // ── Serialization ────────────────────────────────────────────────────

    /// Serialize the Index, relocating its own self-entry first if it has
    /// outgrown its current slot.
    pub fn write_to_disk<F: Read + Write + Seek>(&mut self, file: &mut F) -> Result<()> {
        let self_entry = self.lookup(INDEX_NAME);
        if !self_entry.exists() {
            return self.write_to_new_section(file);
        }

        let outgrown = match self.upper_bound_by_start(&self_entry) {
            Some(next) => next.start < self_entry.start + self.size,
            None => false,
        };

        if outgrown {
            self.remove(&self_entry);
            self.write_to_new_section(file)
        } else {
            codec::seek(file, self_entry.start)?;
            self.write_here(file)
        }
    }

    /// Allocate a fresh slot for the self-entry, over-reserving by 50% so
    /// the Index need not relocate on every insert, then serialize into it.
    fn write_to_new_section<F: Read + Write + Seek>(&mut self, file: &mut F) -> Result<()> {
        let mut provisional = Entry::new(INDEX_NAME, 0, 0);
        let mut reserved = self.size + provisional.header_size();
        reserved += reserved >> 1;

        provisional.length = reserved;
        let start = self.find_gap(reserved);
        provisional.start = start;
        self.insert(provisional);

        codec::seek(file, start)?;
        self.write_here(file)
    }

    /// Write `count` then each Entry record (in by-name order) at the
    /// current file position, then patch the index pointer at
    /// [`INDEX_POINTER_POSITION`] to point at this write.
    fn write_here<F: Write + Seek>(&self, file: &mut F) -> Result<()> {
        let start = file.stream_position().map_err(Error::Io)?;

        codec::write_u64(file, self.by_name.len() as u64)?;
        for entry in self.by_name.values() {
            codec::write_u64(file, entry.start)?;
            codec::write_u64(file, entry.length)?;
            codec::write_len_prefixed_string(file, &entry.name)?;
        }

        codec::seek(file, INDEX_POINTER_POSITION)?;
        codec::write_u64(file, start)
    }

    /// Deserialize an Index at the current file position, inserting each
    /// record. `size` is rebuilt incrementally by those inserts. Duplicate
    /// names in the on-disk form are reported as [`Error::Corrupted`].
    pub fn read<F: Read + Seek>(file: &mut F) -> Result<Self> {
        let mut index = Self::new();
        let count = codec::read_u64(file)?;
        for _ in 0..count {
            let start = codec::read_u64(file)?;
            let length = codec::read_u64(file)?;
            let name = codec::read_len_prefixed_string(file)?;
            index.insert_checked(Entry::new(name, start, length))?;
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_entries(idx: &Index) -> Vec<Entry> {
        idx.iter_by_start().cloned().collect()
    }

    #[test]
    fn find_gap_on_empty_index_returns_data_start() {
        let idx = Index::new();
        assert_eq!(idx.find_gap(100), DATA_START);
    }

    #[test]
    fn find_gap_fits_between_entries() {
        let mut idx = Index::new();
        idx.insert(Entry::new("a", DATA_START, 10));
        idx.insert(Entry::new("b", DATA_START + 10 + 100, 10));
        // There's a 100-byte gap between a's end and b's start.
        assert_eq!(idx.find_gap(50), DATA_START + 10);
    }

    #[test]
    fn find_gap_appends_when_no_gap_fits() {
        let mut idx = Index::new();
        idx.insert(Entry::new("a", DATA_START, 10));
        idx.insert(Entry::new("b", DATA_START + 10, 10));
        assert_eq!(idx.find_gap(5), DATA_START + 20);
    }

    #[test]
    fn insert_and_remove_keep_views_in_sync() {
        let mut idx = Index::new();
        let a = Entry::new("a", DATA_START, 10);
        idx.insert(a.clone());
        assert_eq!(idx.len(), 1);
        assert!(idx.get("a").is_some());
        idx.remove(&a);
        assert_eq!(idx.len(), 0);
        assert!(idx.get("a").is_none());
    }

    #[test]
    fn size_accounting_matches_header_sizes() {
        let mut idx = Index::new();
        let a = Entry::new("abc", DATA_START, 10);
        idx.insert(a.clone());
        assert_eq!(idx.size(), 8 + a.header_size());
        idx.remove(&a);
        assert_eq!(idx.size(), 8);
    }

    #[test]
    fn resize_in_place_fails_when_neighbour_blocks_growth() {
        let mut idx = Index::new();
        let mut a = Entry::new("a", DATA_START, 10);
        idx.insert(a.clone());
        idx.insert(Entry::new("b", DATA_START + 15, 10));
        assert!(!idx.resize_in_place(&mut a, 20));
    }

    #[test]
    fn resize_in_place_succeeds_with_room() {
        let mut idx = Index::new();
        let mut a = Entry::new("a", DATA_START, 10);
        idx.insert(a.clone());
        idx.insert(Entry::new("b", DATA_START + 100, 10));
        assert!(idx.resize_in_place(&mut a, 50));
        assert_eq!(a.length, 50);
        assert_eq!(idx.get("a").unwrap().length, 50);
    }

    #[test]
    fn rename_moves_entry_to_new_name() {
        let mut idx = Index::new();
        let mut a = Entry::new("old", DATA_START, 10);
        idx.insert(a.clone());
        idx.rename(&mut a, "new");
        assert!(idx.get("old").is_none());
        assert_eq!(idx.get("new").unwrap().start, DATA_START);
    }

    #[test]
    fn non_overlap_holds_after_several_creates() {
        let mut idx = Index::new();
        for i in 0..10 {
            idx.create(format!("f{i}"), 7);
        }
        let mut entries = live_entries(&idx);
        entries.sort_by_key(|e| e.start);
        for pair in entries.windows(2) {
            assert!(pair[0].end() <= pair[1].start);
        }
    }

    #[test]
    fn round_trip_through_write_and_read() {
        let mut idx = Index::new();
        idx.insert(Entry::new("alpha", DATA_START, 10));
        idx.insert(Entry::new("beta", DATA_START + 10, 20));

        let mut buf = std::io::Cursor::new(vec![0u8; 12]);
        buf.set_position(0);
        idx.write_to_disk(&mut buf).unwrap();

        // The index pointer was patched at offset 4; read it back, then the
        // serialized Index at that position.
        buf.set_position(4);
        let ptr = codec::read_u64(&mut buf).unwrap();
        buf.set_position(ptr);
        let reloaded = Index::read(&mut buf).unwrap();

        assert_eq!(reloaded.len(), idx.len());
        assert_eq!(reloaded.get("alpha").unwrap().length, 10);
        assert_eq!(reloaded.get("beta").unwrap().length, 20);
    }

    #[test]
    fn read_rejects_duplicate_names() {
        let mut buf = Vec::new();
        {
            let mut cursor = std::io::Cursor::new(&mut buf);
            codec::write_u64(&mut cursor, 2).unwrap();
            for _ in 0..2 {
                codec::write_u64(&mut cursor, DATA_START).unwrap();
                codec::write_u64(&mut cursor, 1).unwrap();
                codec::write_len_prefixed_string(&mut cursor, "dup").unwrap();
            }
        }
        let mut cursor = std::io::Cursor::new(buf);
        let err = Index::read(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));
    }
}
