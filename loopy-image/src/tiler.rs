//! The image tiling pipeline.
//!
//! normalize → (optional 16→8 bit) → channel groups → one GeoTIFF per group.
//! Group files are written in parallel and either all exist afterwards or
//! none do.

use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use loopy_core::{LoopyError, Result, Summarizable};
use loopy_io::{write_geotiff, Dtype, GeoReference, ImageArray, RasterLayout};

use crate::compress::{finalize, intermediate_path};
use crate::config::{Compressor, TileConfig};
use crate::groups::{channel_groups, ChannelGroup};
use crate::normalize::{normalize_shape, ChannelStack};

/// How to interpret a source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOptions {
    /// Ground size of one pixel in meters.
    pub scale: f64,
    pub translate: (f64, f64),
    /// The source is a `(H, W, 3)` RGB image.
    pub rgb: bool,
    pub convert_to_8bit: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: (0.0, 0.0),
            rgb: false,
            convert_to_8bit: false,
        }
    }
}

/// A normalized image ready to be tiled.
#[derive(Debug, Clone)]
pub struct GeoTiff {
    stack: ChannelStack,
    opts: SourceOptions,
}

impl GeoTiff {
    /// Decode and normalize a TIFF file.
    pub fn from_tiff(path: impl AsRef<Path>, opts: SourceOptions) -> Result<Self> {
        let path = path.as_ref();
        log::info!("reading {}", path.display());
        Self::from_array(loopy_io::read_tiff(path)?, opts)
    }

    /// Normalize an in-memory image.
    pub fn from_array(img: ImageArray, opts: SourceOptions) -> Result<Self> {
        let shape = normalize_shape(img.shape(), opts.rgb)?;
        let mut stack = ChannelStack::from_image(img, &shape)?;
        if opts.convert_to_8bit {
            stack = stack.into_8bit();
        }
        Ok(Self { stack, opts })
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.stack.dim().0
    }

    /// Element type after any requested conversion.
    pub fn dtype(&self) -> Dtype {
        self.stack.dtype()
    }

    pub fn max_value(&self) -> u32 {
        self.stack.max_value()
    }

    pub fn scale(&self) -> f64 {
        self.opts.scale
    }

    pub fn translate(&self) -> (f64, f64) {
        self.opts.translate
    }

    /// Lay out the output files for `out` (a `.tif` path whose stem names
    /// the image) without writing anything.
    pub fn plan(self, out: impl AsRef<Path>, config: TileConfig) -> Result<TileJob> {
        let out = out.as_ref();
        let stem = out
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                LoopyError::InvalidInput(format!("output path {} has no file stem", out.display()))
            })?
            .to_string();
        let dir = out.parent().map(Path::to_path_buf).unwrap_or_default();
        let groups = channel_groups(self.channels(), config.group_size)?;

        let quality = config.quality();
        if !(1..=100).contains(&quality) {
            return Err(LoopyError::InvalidInput(format!(
                "quality must be between 1 and 100, got {quality}"
            )));
        }
        if self.dtype() == Dtype::Uint16 && config.quality.is_some() {
            log::warn!("quality is ignored for 16-bit images; tiles are compressed losslessly");
        }
        if self.dtype() == Dtype::Uint8 && config.compressor == Compressor::Inline {
            for g in groups.iter().filter(|g| !matches!(g.len, 1 | 3)) {
                log::warn!(
                    "{stem}{}.tif holds {} channels; JPEG needs 1 or 3, writing Deflate tiles",
                    g.suffix,
                    g.len
                );
            }
        }

        Ok(TileJob {
            image: self,
            dir,
            stem,
            groups,
            config,
        })
    }
}

/// A planned tiling run: file names are known, nothing is written yet.
#[derive(Debug, Clone)]
pub struct TileJob {
    image: GeoTiff,
    dir: PathBuf,
    stem: String,
    groups: Vec<ChannelGroup>,
    config: TileConfig,
}

impl TileJob {
    /// Output file names relative to the output directory, in channel order.
    pub fn names(&self) -> Vec<String> {
        self.groups
            .iter()
            .map(|g| format!("{}{}.tif", self.stem, g.suffix))
            .collect()
    }

    pub fn groups(&self) -> &[ChannelGroup] {
        &self.groups
    }

    fn write_group(&self, group: &ChannelGroup) -> Result<PathBuf> {
        let final_path = self.dir.join(format!("{}{}.tif", self.stem, group.suffix));
        let (_, height, width) = self.image.stack.dim();
        let layout = RasterLayout {
            width,
            height,
            samples: group.len,
            rgb: self.image.opts.rgb,
            georef: GeoReference {
                scale: self.image.opts.scale,
                translate: self.image.opts.translate,
                epsg: self.config.epsg,
            },
            overviews: self.config.overview_levels.clone(),
            compression: self.config.compressor.intermediate_compression(
                self.image.dtype(),
                group.len,
                self.config.quality(),
            ),
        };

        let pixels = self.image.stack.interleave(group.start, group.len);
        write_geotiff(intermediate_path(&final_path), &pixels, &layout)?;
        finalize(
            &self.config.compressor,
            &final_path,
            self.image.dtype(),
            self.config.quality(),
        )?;
        log::debug!("wrote {}", final_path.display());
        Ok(final_path)
    }

    /// Write every group. On failure the groups that did finish are removed
    /// and the first error in channel order is returned.
    pub fn run(self) -> Result<Vec<PathBuf>> {
        log::info!(
            "tiling {} channels into {} file(s) in {}",
            self.image.channels(),
            self.groups.len(),
            self.dir.display()
        );

        #[cfg(feature = "parallel")]
        let results: Vec<Result<PathBuf>> =
            self.groups.par_iter().map(|g| self.write_group(g)).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<PathBuf>> =
            self.groups.iter().map(|g| self.write_group(g)).collect();

        if results.iter().all(|r| r.is_ok()) {
            return results.into_iter().collect();
        }

        let mut first_err = None;
        for result in results {
            match result {
                Ok(path) => {
                    if let Err(e) = std::fs::remove_file(&path) {
                        log::warn!("could not remove {}: {e}", path.display());
                    }
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| LoopyError::Other("tiling failed".into())))
    }
}

impl Summarizable for TileJob {
    fn summary(&self) -> String {
        let (c, h, w) = self.image.stack.dim();
        format!(
            "TileJob: {c} {} channels, {w}\u{00d7}{h} px, {} file(s)",
            self.image.dtype(),
            self.groups.len()
        )
    }
}
