//! Zero-copy byte sources over memory-mapped files.
//!
//! A [`MappedFile`] owns an open file together with its read-only mapping.
//! Views hand out bounded, offset-relative windows into that mapping without
//! copying:
//!
//! - [`FileView`]: the root view, offset 0, covering the whole file. Only the
//!   root can [`derive`](FileView::derive) further views or be closed.
//! - [`SubView`]: a derived view starting `start` bytes into its parent. Its
//!   offset can be moved with [`adjust`](SubView::adjust) so sequential
//!   walkers can advance without allocating a new view.
//!
//! All views share the mapping through an `Arc`, so it is released when the
//! last view referencing it is dropped.

mod mapped;
mod view;

pub use mapped::MappedFile;
pub use view::{FileView, SubView, ViewError};

use std::ops::Range;

/// Random access capability handed to metadata parsers.
///
/// Parsers depend on this trait only, never on a concrete mapped-file type.
/// The trait is object safe so parsers can take `&mut dyn ByteSource`.
pub trait ByteSource {
    /// Number of bytes visible through this source.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the byte range `[start, stop)`, relative to this source.
    ///
    /// Bounds are clamped in this order:
    /// 1. an unset or negative `start` becomes 0
    /// 2. an unset `stop`, or one past the end, becomes `len()`
    /// 3. a `start` at or past `len()` becomes `len() - 1`
    ///
    /// so `read(Some(12), Some(15))` on a 10 byte source yields the final byte.
    fn read(&self, start: Option<i64>, stop: Option<i64>) -> &[u8];

    /// Read up to `len` bytes at `start` without the trailing-byte clamp:
    /// a `start` at or past the end yields an empty slice.
    fn read_at(&self, start: u64, len: usize) -> &[u8] {
        if start >= self.len() {
            return &[];
        }
        let start = i64::try_from(start).unwrap_or(i64::MAX);
        let stop = start.saturating_add(i64::try_from(len).unwrap_or(i64::MAX));
        self.read(Some(start), Some(stop))
    }

    /// Single byte at `index`, subject to the same clamping as [`read`](Self::read).
    fn byte_at(&self, index: i64) -> Option<u8> {
        self.read(Some(index), Some(index.saturating_add(1)))
            .first()
            .copied()
    }

    /// First position of `needle` at or after the start of this source.
    fn find(&self, needle: &[u8]) -> Option<u64>;

    fn starts_with(&self, needle: &[u8]) -> bool {
        let len = i64::try_from(needle.len()).unwrap_or(i64::MAX);
        self.read(Some(0), Some(len)) == needle
    }

    /// Move the cursor to `position`, relative to this source.
    fn seek(&mut self, position: u64);

    /// Current cursor position, relative to this source.
    fn tell(&self) -> u64;
}

/// Resolve a clamped `read` against a window of `size` bytes at `offset`
/// inside a mapping of `mapped` bytes. Returns absolute mapping bounds.
pub(crate) fn clamp_range(
    offset: u64,
    size: u64,
    mapped: usize,
    start: Option<i64>,
    stop: Option<i64>,
) -> Range<usize> {
    let size = i64::try_from(size).unwrap_or(i64::MAX);

    let mut start = match start {
        Some(s) if s >= 0 => s,
        _ => 0,
    };
    let stop = match stop {
        Some(s) if s <= size => s,
        _ => size,
    };
    if start >= size {
        start = size - 1;
    }

    // An empty window steps before its own start; a negative stop never
    // selects anything.
    if start < 0 || stop <= start {
        return 0..0;
    }

    let abs_start = offset.saturating_add(start as u64).min(mapped as u64) as usize;
    let abs_stop = offset.saturating_add(stop as u64).min(mapped as u64) as usize;
    if abs_start >= abs_stop {
        return 0..0;
    }
    abs_start..abs_stop
}

/// First position of `needle` in `data` at or after `offset`, relative to `offset`.
pub(crate) fn find_from(data: &[u8], offset: u64, needle: &[u8]) -> Option<u64> {
    let offset = usize::try_from(offset).ok()?;
    let haystack = data.get(offset..)?;
    memchr::memmem::find(haystack, needle).map(|pos| pos as u64)
}
