//! Memory-mapped file access for zero-copy reads.
//!
//! Used to serve single records out of a written `.bin` chunk blob and to
//! hand large source rasters to the TIFF decoder without buffering them.

use memmap2::Mmap;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

use crate::{LoopyError, Result};

/// A read-only memory-mapped file.
pub struct MappedFile {
    _file: File,
    mmap: Mmap,
}

impl MappedFile {
    /// Open and memory-map a file.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the file is not modified by another process
    /// while the mapping is active. Bundles are single-writer, so this holds
    /// for artifacts read back after a commit.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LoopyError::io_at(path, e))?;
        // SAFETY: We hold the File open for the lifetime of the mapping.
        // The caller is responsible for ensuring no concurrent modification.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| LoopyError::io_at(path, e))?;
        Ok(Self { _file: file, mmap })
    }

    /// The mapped bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the mapped region is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Decompress the chunk record stored at `range`, `None` if the range is empty.
    pub fn record(&self, range: Range<usize>) -> Result<Option<Vec<u8>>> {
        crate::chunk::read_record(self.as_bytes(), range)
    }
}

impl AsRef<[u8]> for MappedFile {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
