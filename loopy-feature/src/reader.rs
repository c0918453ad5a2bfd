//! Random access into a written chunked feature store.

use std::path::Path;

use loopy_core::mmap::MappedFile;
use loopy_core::{LoopyError, Result};

use crate::header::{ChunkedHeader, SparseMode};

/// A `.bin` blob and its header, read one chunk at a time.
pub struct ChunkedReader {
    header: ChunkedHeader,
    data: MappedFile,
}

impl ChunkedReader {
    /// Open `bin` and the JSON header at `header`.
    pub fn open(bin: impl AsRef<Path>, header: impl AsRef<Path>) -> Result<Self> {
        let header = ChunkedHeader::read(header)?;
        let data = MappedFile::open(bin)?;
        let end = header.ptr.last().copied().unwrap_or(0);
        if end as usize > data.len() {
            return Err(LoopyError::Consistency(format!(
                "header expects {end} bytes but blob has {}",
                data.len()
            )));
        }
        Ok(Self { header, data })
    }

    pub fn header(&self) -> &ChunkedHeader {
        &self.header
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.header.n_chunks()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decompressed chunk `i`, `None` when the chunk is absent.
    pub fn record(&self, i: usize) -> Result<Option<Vec<u8>>> {
        if i >= self.len() {
            return Err(LoopyError::InvalidInput(format!(
                "chunk {i} out of bounds for {} chunks",
                self.len()
            )));
        }
        let range = self.header.ptr[i] as usize..self.header.ptr[i + 1] as usize;
        self.data.record(range)
    }

    /// Chunk of the feature called `name`.
    pub fn record_by_name(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let i = self
            .header
            .index_of(name)
            .ok_or_else(|| LoopyError::InvalidInput(format!("no chunk named '{name}'")))?;
        self.record(i)
    }

    /// `(index, value)` pairs of a sparse chunk; empty for an absent chunk.
    pub fn sparse_entries(&self, i: usize) -> Result<Vec<(usize, f64)>> {
        let Some(raw) = self.record(i)? else {
            return Ok(Vec::new());
        };
        let mut reader = csv::Reader::from_reader(raw.as_slice());
        let mut out = Vec::new();
        for row in reader.deserialize::<(usize, f64)>() {
            out.push(row.map_err(|e| LoopyError::Parse(format!("chunk {i}: {e}")))?);
        }
        Ok(out)
    }

    /// Dense values of an [`SparseMode::Array`] chunk, `length` long with
    /// zeros for absent entries.
    pub fn dense_column(&self, i: usize) -> Result<Vec<f64>> {
        if self.header.sparse_mode != Some(SparseMode::Array) {
            return Err(LoopyError::InvalidInput(
                "dense reconstruction needs an array-mode store".into(),
            ));
        }
        let mut dense = vec![0.0; self.header.length];
        for (index, value) in self.sparse_entries(i)? {
            let slot = dense.get_mut(index).ok_or_else(|| {
                LoopyError::Consistency(format!(
                    "chunk {i} index {index} exceeds length {}",
                    self.header.length
                ))
            })?;
            *slot = value;
        }
        Ok(dense)
    }

    /// Values of a dense (non-sparse) chunk, header line removed.
    pub fn dense_values(&self, i: usize) -> Result<Vec<String>> {
        let Some(raw) = self.record(i)? else {
            return Ok(Vec::new());
        };
        let text = String::from_utf8(raw)
            .map_err(|e| LoopyError::Parse(format!("chunk {i}: {e}")))?;
        Ok(text.lines().skip(1).map(String::from).collect())
    }
}
