use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// An open file and its read-only memory mapping.
///
/// The mapping is declared before the file so both are released together,
/// mapping first, when the value is dropped.
#[derive(Debug)]
pub struct MappedFile {
    map: Mmap,
    _file: File,
    path: PathBuf,
}

impl MappedFile {
    /// Open and map `path` read-only.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and staged input files are not
        // modified while a request is being served.
        let map = unsafe { Mmap::map(&file)? };
        tracing::trace!(path = %path.display(), size = map.len(), "mapped file");
        Ok(Self {
            map,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte length of the underlying file, fixed once mapped.
    pub fn size(&self) -> u64 {
        self.map.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path.display(), "released mapping");
    }
}
