//! Entry — the in-memory descriptor for one subfile.
//!
//! A pure value type: name, start offset, byte length. `end`, `header_size`,
//! and `exists` are derived, never stored.

/// One subfile's location and extent within the backing file.
///
/// # Invariants (enforced by [`crate::index::Index`], not by this type)
/// - `name` is non-empty and unique across all live entries.
/// - `length > 0` for any Entry actually present in the Index — a
///   zero-length Entry is only ever a lookup-miss sentinel, see [`Entry::miss`].
/// - `start >= DATA_START`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub start: u64,
    pub length: u64,
}

impl Entry {
    pub fn new(name: impl Into<String>, start: u64, length: u64) -> Self {
        Self { name: name.into(), start, length }
    }

    /// A zero-length sentinel used only to report a lookup miss. Never
    /// stored in the Index.
    pub fn miss(name: impl Into<String>) -> Self {
        Self { name: name.into(), start: 0, length: 0 }
    }

    /// One past the last byte owned by this Entry's range.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// The on-disk serialized size of this Entry's record in the Index:
    /// `start` (8) + `length` (8) + `name_len` (8) + `name` bytes.
    #[inline]
    pub fn header_size(&self) -> u64 {
        self.name.len() as u64 + 3 * 8
    }

    /// Distinguishes a found Entry from a lookup-miss sentinel.
    #[inline]
    pub fn exists(&self) -> bool {
        self.length > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_is_start_plus_length() {
        let e = Entry::new("foo", 100, 50);
        assert_eq!(e.end(), 150);
    }

    #[test]
    fn header_size_matches_on_disk_layout() {
        let e = Entry::new("abcde", 0, 10);
        // start(8) + length(8) + name_len(8) + 5 name bytes = 29
        assert_eq!(e.header_size(), 29);
    }

    #[test]
    fn miss_sentinel_does_not_exist() {
        let e = Entry::miss("nope");
        assert!(!e.exists());
        let e2 = Entry::new("yep", 12, 1);
        assert!(e2.exists());
    }
}
