//! Compression utilities with algorithm auto-detection.
//!
//! Chunk records are compressed one at a time so that any record can be
//! decompressed from its byte range alone. gzip is what browser consumers
//! decode; zstd is available for bundles read by native tooling.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{LoopyError, Result};

/// Level used for gzip records.
pub const GZIP_LEVEL: u32 = 9;

/// Level used for zstd records.
pub const ZSTD_LEVEL: i32 = 3;

/// Supported compression algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Zstd,
    #[default]
    Gzip,
}

impl Algorithm {
    /// Compress `data` with this algorithm at its fixed level.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Algorithm::Zstd => zstd_compress(data, ZSTD_LEVEL),
            Algorithm::Gzip => gzip_compress(data, GZIP_LEVEL),
        }
    }
}

/// Compress data using zstd at the given level (1–22).
pub fn zstd_compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| LoopyError::Compression(e.to_string()))
}

/// Decompress zstd data.
pub fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| LoopyError::Compression(e.to_string()))
}

/// Compress data using gzip at the given level (0–9).
///
/// The header carries no timestamp, so equal input gives equal output.
pub fn gzip_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::GzBuilder;

    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| LoopyError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| LoopyError::Compression(e.to_string()))
}

/// Decompress gzip data.
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;

    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| LoopyError::Compression(e.to_string()))?;
    Ok(decompressed)
}

/// Detect the compression algorithm from the magic bytes of `data`.
///
/// Returns `None` if the data does not match a known format.
pub fn detect_algorithm(data: &[u8]) -> Option<Algorithm> {
    if data.len() >= 4 && data[..4] == [0x28, 0xB5, 0x2F, 0xFD] {
        Some(Algorithm::Zstd)
    } else if data.len() >= 2 && data[..2] == [0x1F, 0x8B] {
        Some(Algorithm::Gzip)
    } else {
        None
    }
}

/// Decompress data by auto-detecting the algorithm from magic bytes.
///
/// Returns an error if the format is unrecognised.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    match detect_algorithm(data) {
        Some(Algorithm::Zstd) => zstd_decompress(data),
        Some(Algorithm::Gzip) => gzip_decompress(data),
        None => Err(LoopyError::Compression(
            "unknown compression format".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip() {
        let original = b"index,value\n1,0.5\n4,2\n";
        let compressed = zstd_compress(original, 3).unwrap();
        let decompressed = zstd_decompress(&compressed).unwrap();
        assert_eq!(original.to_vec(), decompressed);
    }

    #[test]
    fn test_gzip_roundtrip() {
        let original = b"index,value\n0,3\n";
        let compressed = gzip_compress(original, 6).unwrap();
        let decompressed = gzip_decompress(&compressed).unwrap();
        assert_eq!(original.to_vec(), decompressed);
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let a = Algorithm::Gzip.compress(b"same bytes").unwrap();
        let b = Algorithm::Gzip.compress(b"same bytes").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_detect_zstd() {
        let compressed = Algorithm::Zstd.compress(b"test").unwrap();
        assert_eq!(detect_algorithm(&compressed), Some(Algorithm::Zstd));
    }

    #[test]
    fn test_detect_gzip() {
        let compressed = Algorithm::Gzip.compress(b"test").unwrap();
        assert_eq!(detect_algorithm(&compressed), Some(Algorithm::Gzip));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_algorithm(b"not compressed"), None);
    }

    #[test]
    fn test_auto_decompress() {
        for algo in [Algorithm::Gzip, Algorithm::Zstd] {
            let compressed = algo.compress(b"auto-detect").unwrap();
            assert_eq!(decompress(&compressed).unwrap(), b"auto-detect".to_vec());
        }
    }

    #[test]
    fn test_auto_decompress_unknown() {
        let result = decompress(b"not compressed data");
        assert!(result.is_err());
    }

    #[test]
    fn test_algorithm_serde() {
        assert_eq!(serde_json::to_string(&Algorithm::Gzip).unwrap(), "\"gzip\"");
        let parsed: Algorithm = serde_json::from_str("\"zstd\"").unwrap();
        assert_eq!(parsed, Algorithm::Zstd);
    }
}
