//! Index header written next to every chunked `.bin` blob.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use loopy_core::{LoopyError, Result};

/// How a sparse chunk is densified by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SparseMode {
    /// One chunk per feature column; `index` is a row position.
    Array,
    /// One chunk per entity row; `index` is a position in `names`.
    Record,
}

/// Offsets and labels of a chunked feature store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedHeader {
    /// Feature labels in column order; a label's position is its index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    pub ptr: Vec<u64>,
    /// Size of the axis orthogonal to the chunks.
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_mode: Option<SparseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_name: Option<String>,
}

impl ChunkedHeader {
    /// Number of chunks indexed.
    pub fn n_chunks(&self) -> usize {
        self.ptr.len().saturating_sub(1)
    }

    /// Position of `name` in `names`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.as_ref()?.iter().position(|n| n == name)
    }

    /// Serialize to `path` as JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| LoopyError::io_at(path, e))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Read a header written by [`ChunkedHeader::write`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| LoopyError::io_at(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| LoopyError::Parse(format!("{}: {e}", path.display())))
    }
}
