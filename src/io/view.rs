use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use super::{ByteSource, MappedFile, clamp_range, find_from};

/// Errors raised by view operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    /// An adjustment would move the view before the start of the mapping.
    #[error("cannot adjust view at offset {offset} by {delta}")]
    OffsetUnderflow { offset: u64, delta: i64 },
}

/// Root view over a [`MappedFile`]: offset 0, covering the whole file.
#[derive(Debug)]
pub struct FileView {
    file: Arc<MappedFile>,
    cursor: u64,
}

impl FileView {
    /// Open and map `path`, returning the root view over it.
    pub fn open(path: &Path) -> io::Result<Self> {
        MappedFile::open(path).map(Self::new)
    }

    pub fn new(file: MappedFile) -> Self {
        Self {
            file: Arc::new(file),
            cursor: 0,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Window starting `start` bytes into this file.
    ///
    /// The derived view shares the mapping; its size is the remaining length,
    /// zero when `start` lies past the end.
    pub fn derive(&self, start: u64) -> SubView {
        SubView {
            file: Arc::clone(&self.file),
            offset: start,
            size: self.file.size().saturating_sub(start),
            cursor: 0,
        }
    }

    /// Give up the root view. The mapping itself is released once no derived
    /// view references it any more.
    pub fn close(self) {
        tracing::trace!(
            path = %self.file.path().display(),
            views = Arc::strong_count(&self.file) - 1,
            "closing root view"
        );
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> std::sync::Weak<MappedFile> {
        Arc::downgrade(&self.file)
    }
}

impl ByteSource for FileView {
    fn len(&self) -> u64 {
        self.file.size()
    }

    fn read(&self, start: Option<i64>, stop: Option<i64>) -> &[u8] {
        let data = self.file.bytes();
        &data[clamp_range(0, self.file.size(), data.len(), start, stop)]
    }

    fn find(&self, needle: &[u8]) -> Option<u64> {
        find_from(self.file.bytes(), 0, needle)
    }

    fn seek(&mut self, position: u64) {
        self.cursor = position;
    }

    fn tell(&self) -> u64 {
        self.cursor
    }
}

/// View derived from a [`FileView`] at some start offset.
///
/// Derived views cannot derive further views or close the mapping; they only
/// keep it alive. Their offset can be moved with [`adjust`](Self::adjust).
#[derive(Debug)]
pub struct SubView {
    file: Arc<MappedFile>,
    offset: u64,
    size: u64,
    cursor: u64,
}

impl SubView {
    /// Absolute position in the mapping where this view begins.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Shift the view's offset by `delta` bytes. The size is left untouched;
    /// reads past the end of the mapping come back short.
    pub fn adjust(&mut self, delta: i64) -> Result<(), ViewError> {
        self.offset = self
            .offset
            .checked_add_signed(delta)
            .ok_or(ViewError::OffsetUnderflow {
                offset: self.offset,
                delta,
            })?;
        Ok(())
    }
}

impl ByteSource for SubView {
    fn len(&self) -> u64 {
        self.size
    }

    fn read(&self, start: Option<i64>, stop: Option<i64>) -> &[u8] {
        let data = self.file.bytes();
        &data[clamp_range(self.offset, self.size, data.len(), start, stop)]
    }

    fn find(&self, needle: &[u8]) -> Option<u64> {
        find_from(self.file.bytes(), self.offset, needle)
    }

    fn seek(&mut self, position: u64) {
        self.cursor = position;
    }

    fn tell(&self) -> u64 {
        self.cursor
    }
}
