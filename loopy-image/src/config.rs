//! Tiling configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use loopy_io::{Dtype, RasterCompression, DEFAULT_EPSG, DEFAULT_OVERVIEWS};

/// Channels per output file.
pub const DEFAULT_GROUP_SIZE: usize = 3;

/// JPEG quality for 8-bit groups when none is requested.
pub const DEFAULT_QUALITY: u8 = 90;

/// Post-processing applied to each written raster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Compressor {
    /// Tiles encoded in-process: JPEG for 8-bit groups of 1 or 3 channels,
    /// Deflate for everything else. Needs no external tools.
    #[default]
    Inline,
    /// Re-encode with `gdal_translate`: JPEG for 8-bit groups, Deflate for
    /// 16-bit groups.
    Gdal { program: PathBuf },
}

impl Compressor {
    /// `gdal_translate` from `PATH`.
    pub fn gdal() -> Self {
        Compressor::Gdal {
            program: PathBuf::from("gdal_translate"),
        }
    }

    /// Tile compression of the intermediate raster for a group of
    /// `samples` channels of `dtype`.
    pub fn intermediate_compression(
        &self,
        dtype: Dtype,
        samples: usize,
        quality: u8,
    ) -> RasterCompression {
        match self {
            Compressor::Inline => {
                let jpeg = RasterCompression::Jpeg { quality };
                if dtype == Dtype::Uint8 && jpeg.supports(8, samples) {
                    jpeg
                } else {
                    RasterCompression::Deflate
                }
            }
            Compressor::Gdal { .. } => RasterCompression::None,
        }
    }
}

/// Options of the image tiling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileConfig {
    /// Channels per output file: 3, or 4 for the legacy layout.
    pub group_size: usize,
    /// Requested JPEG quality; [`DEFAULT_QUALITY`] when unset.
    pub quality: Option<u8>,
    pub overview_levels: Vec<u32>,
    pub epsg: u16,
    pub compressor: Compressor,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            quality: None,
            overview_levels: DEFAULT_OVERVIEWS.to_vec(),
            epsg: DEFAULT_EPSG,
            compressor: Compressor::default(),
        }
    }
}

impl TileConfig {
    /// Effective JPEG quality.
    pub fn quality(&self) -> u8 {
        self.quality.unwrap_or(DEFAULT_QUALITY)
    }

    /// Builder-style quality override.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = TileConfig::default();
        assert_eq!(c.group_size, 3);
        assert_eq!(c.quality(), 90);
        assert_eq!(c.overview_levels, vec![4, 8, 16, 32, 64]);
        assert_eq!(c.epsg, 32648);
        assert_eq!(c.with_quality(99).quality(), 99);
    }

    #[test]
    fn test_compressor_serde() {
        let json = serde_json::to_string(&Compressor::gdal()).unwrap();
        assert_eq!(json, r#"{"kind":"gdal","program":"gdal_translate"}"#);
        let back: Compressor = serde_json::from_str(r#"{"kind":"inline"}"#).unwrap();
        assert_eq!(back, Compressor::Inline);
    }

    #[test]
    fn test_inline_compression_by_group() {
        let inline = Compressor::Inline;
        assert_eq!(
            inline.intermediate_compression(Dtype::Uint8, 3, 50),
            RasterCompression::Jpeg { quality: 50 }
        );
        assert_eq!(
            inline.intermediate_compression(Dtype::Uint8, 1, 90),
            RasterCompression::Jpeg { quality: 90 }
        );
        assert_eq!(inline.intermediate_compression(Dtype::Uint8, 2, 90), RasterCompression::Deflate);
        assert_eq!(inline.intermediate_compression(Dtype::Uint16, 3, 90), RasterCompression::Deflate);
        assert_eq!(
            Compressor::gdal().intermediate_compression(Dtype::Uint8, 3, 90),
            RasterCompression::None
        );
    }
}
