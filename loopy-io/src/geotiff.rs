//! Tiled GeoTIFF writer with an overview pyramid.
//!
//! The `tiff` crate only encodes strips, while the viewer streams 256×256
//! tiles and reduced-resolution overviews by HTTP range. This module writes
//! that layout directly:
//!
//! - little-endian TIFF, switching to BigTIFF when the data may exceed 4 GiB
//! - chunky (pixel-interleaved) tiles, edge tiles zero padded
//! - Deflate tiles, or one self-contained JPEG stream per tile for 8-bit
//!   rasters of 1 or 3 samples (3-sample JPEG tiles are tagged YCbCr)
//! - the full-resolution IFD carries the GeoTIFF georeference
//! - one IFD per overview factor, `NewSubfileType = 1`, nearest-neighbour
//!   decimation so no intermediate intensities are invented

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use serde::{Deserialize, Serialize};

use loopy_core::{LoopyError, Result};

use crate::raster::Interleaved;

/// Edge length of every tile.
pub const TILE_SIZE: usize = 256;

/// Default overview decimation factors.
pub const DEFAULT_OVERVIEWS: [u32; 5] = [4, 8, 16, 32, 64];

/// Projected CRS written when none is configured (WGS 84 / UTM 48N).
pub const DEFAULT_EPSG: u16 = 32648;

// ---------------------------------------------------------------------------
// Georeferencing
// ---------------------------------------------------------------------------

/// Affine placement `(scale, 0, tx, 0, -scale, ty)`: row 0 is the top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    /// Ground size of one pixel.
    pub scale: f64,
    /// Model coordinates of the top-left corner.
    pub translate: (f64, f64),
    /// EPSG code of the projected coordinate system.
    pub epsg: u16,
}

impl Default for GeoReference {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: (0.0, 0.0),
            epsg: DEFAULT_EPSG,
        }
    }
}

impl GeoReference {
    /// The six GDAL-style affine coefficients.
    pub fn transform(&self) -> [f64; 6] {
        [
            self.scale,
            0.0,
            self.translate.0,
            0.0,
            -self.scale,
            self.translate.1,
        ]
    }
}

/// Tile payload compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterCompression {
    /// Raw samples, used for intermediates handed to an external encoder.
    None,
    /// zlib/Deflate, lossless.
    #[default]
    Deflate,
    /// Baseline JPEG at `quality` (1-100). 8-bit rasters of 1 or 3 samples.
    Jpeg { quality: u8 },
}

impl RasterCompression {
    fn tag_value(self) -> u16 {
        match self {
            RasterCompression::None => 1,
            RasterCompression::Deflate => 8,
            RasterCompression::Jpeg { .. } => 7,
        }
    }

    /// Whether rasters of `bits`-bit samples, `samples` per pixel, can be
    /// written with this compression.
    pub fn supports(self, bits: u16, samples: usize) -> bool {
        match self {
            RasterCompression::Jpeg { .. } => bits == 8 && matches!(samples, 1 | 3),
            _ => true,
        }
    }
}

/// Everything needed to write one raster besides its pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayout {
    pub width: usize,
    pub height: usize,
    pub samples: usize,
    /// The samples are the red, green and blue of a colour image rather than
    /// independent channels.
    pub rgb: bool,
    pub georef: GeoReference,
    pub overviews: Vec<u32>,
    pub compression: RasterCompression,
}

// ---------------------------------------------------------------------------
// Sample types
// ---------------------------------------------------------------------------

trait Sample: Copy + Default {
    const BITS: u16;
    fn put_le(self, out: &mut Vec<u8>);
}

impl Sample for u8 {
    const BITS: u16 = 8;
    fn put_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Sample for u16 {
    const BITS: u16 = 16;
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// IFD encoding
// ---------------------------------------------------------------------------

const SHORT: u16 = 3;
const LONG: u16 = 4;
const DOUBLE: u16 = 12;
const LONG8: u16 = 16;

enum Value {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Double(Vec<f64>),
    /// File offsets and byte counts: LONG in classic TIFF, LONG8 in BigTIFF.
    Offsets(Vec<u64>),
}

impl Value {
    fn encode(&self, big: bool) -> Result<(u16, u64, Vec<u8>)> {
        let mut buf = Vec::new();
        let (ty, count) = match self {
            Value::Short(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes()));
                (SHORT, v.len())
            }
            Value::Long(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes()));
                (LONG, v.len())
            }
            Value::Double(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes()));
                (DOUBLE, v.len())
            }
            Value::Offsets(v) if big => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes()));
                (LONG8, v.len())
            }
            Value::Offsets(v) => {
                for &x in v {
                    let x = u32::try_from(x).map_err(|_| {
                        LoopyError::Other(format!("offset {x} does not fit a classic TIFF"))
                    })?;
                    buf.extend_from_slice(&x.to_le_bytes());
                }
                (LONG, v.len())
            }
        };
        Ok((ty, count as u64, buf))
    }
}

/// Serialize an IFD that will start at file offset `start`.
///
/// Returns the bytes and the offset of the next-IFD pointer inside them.
fn encode_ifd(mut entries: Vec<(u16, Value)>, start: u64, big: bool) -> Result<(Vec<u8>, usize)> {
    entries.sort_by_key(|(tag, _)| *tag);
    let n = entries.len();
    let (count_len, entry_len, inline_len, ptr_len) = if big { (8, 20, 8, 8) } else { (2, 12, 4, 4) };
    let table_len = count_len + n * entry_len + ptr_len;

    let mut table = Vec::with_capacity(table_len);
    let mut extra: Vec<u8> = Vec::new();
    if big {
        table.extend_from_slice(&(n as u64).to_le_bytes());
    } else {
        table.extend_from_slice(&(n as u16).to_le_bytes());
    }

    for (tag, value) in &entries {
        let (ty, count, data) = value.encode(big)?;
        table.extend_from_slice(&tag.to_le_bytes());
        table.extend_from_slice(&ty.to_le_bytes());
        if big {
            table.extend_from_slice(&count.to_le_bytes());
        } else {
            table.extend_from_slice(&(count as u32).to_le_bytes());
        }
        if data.len() <= inline_len {
            let mut field = data;
            field.resize(inline_len, 0);
            table.extend_from_slice(&field);
        } else {
            let at = start + table_len as u64 + extra.len() as u64;
            if big {
                table.extend_from_slice(&at.to_le_bytes());
            } else {
                let at = u32::try_from(at).map_err(|_| {
                    LoopyError::Other(format!("IFD offset {at} does not fit a classic TIFF"))
                })?;
                table.extend_from_slice(&at.to_le_bytes());
            }
            extra.extend_from_slice(&data);
            if extra.len() % 2 == 1 {
                extra.push(0);
            }
        }
    }

    let next_at = table.len();
    table.extend(std::iter::repeat(0u8).take(ptr_len));
    table.extend_from_slice(&extra);
    Ok((table, next_at))
}

// ---------------------------------------------------------------------------
// Pixels
// ---------------------------------------------------------------------------

fn tile_bytes<T: Sample>(
    data: &[T],
    width: usize,
    height: usize,
    samples: usize,
    tx: usize,
    ty: usize,
) -> Vec<u8> {
    let bytes_per_sample = (T::BITS / 8) as usize;
    let mut out = Vec::with_capacity(TILE_SIZE * TILE_SIZE * samples * bytes_per_sample);
    let x0 = tx * TILE_SIZE;
    let y0 = ty * TILE_SIZE;
    let cols = TILE_SIZE.min(width - x0);
    for row in 0..TILE_SIZE {
        let y = y0 + row;
        if y < height {
            let start = (y * width + x0) * samples;
            for &v in &data[start..start + cols * samples] {
                v.put_le(&mut out);
            }
        }
        let written = out.len();
        let row_end = (row + 1) * TILE_SIZE * samples * bytes_per_sample;
        out.resize(written.max(row_end), 0);
    }
    out
}

/// Nearest-neighbour decimation by `factor`.
fn decimate<T: Sample>(
    data: &[T],
    width: usize,
    height: usize,
    samples: usize,
    factor: usize,
) -> (Vec<T>, usize, usize) {
    let w = width.div_ceil(factor);
    let h = height.div_ceil(factor);
    let mut out = Vec::with_capacity(w * h * samples);
    for y in 0..h {
        let sy = (y * factor + factor / 2).min(height - 1);
        for x in 0..w {
            let sx = (x * factor + factor / 2).min(width - 1);
            let at = (sy * width + sx) * samples;
            out.extend_from_slice(&data[at..at + samples]);
        }
    }
    (out, w, h)
}

fn encode_jpeg(raw: &[u8], samples: usize, quality: u8) -> Result<Vec<u8>> {
    let color = match samples {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        n => {
            return Err(LoopyError::InvalidInput(format!(
                "JPEG tiles need 1 or 3 samples per pixel, got {n}"
            )))
        }
    };
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(raw, TILE_SIZE as u32, TILE_SIZE as u32, color)
        .map_err(|e| LoopyError::Compression(format!("jpeg: {e}")))?;
    Ok(out)
}

fn compress_tile(raw: Vec<u8>, compression: RasterCompression, samples: usize) -> Result<Vec<u8>> {
    match compression {
        RasterCompression::None => Ok(raw),
        RasterCompression::Deflate => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&raw)?;
            enc.finish()
                .map_err(|e| LoopyError::Compression(format!("deflate: {e}")))
        }
        RasterCompression::Jpeg { quality } => encode_jpeg(&raw, samples, quality),
    }
}

const MINISBLACK: u16 = 1;
const RGB: u16 = 2;
const YCBCR: u16 = 6;

/// Photometric interpretation and the number of extra samples.
fn photometric_for(layout: &RasterLayout) -> (u16, usize) {
    let samples = layout.samples;
    match layout.compression {
        RasterCompression::Jpeg { .. } if samples == 3 => (YCBCR, 0),
        _ if layout.rgb && samples >= 3 => (RGB, samples - 3),
        _ => (MINISBLACK, samples - 1),
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

struct Level<'a, T: Clone> {
    data: std::borrow::Cow<'a, [T]>,
    width: usize,
    height: usize,
    overview: bool,
}

fn needs_bigtiff(layout: &RasterLayout, bytes_per_sample: usize) -> bool {
    let full = (layout.width.div_ceil(TILE_SIZE) * layout.height.div_ceil(TILE_SIZE)) as u64
        * (TILE_SIZE * TILE_SIZE * layout.samples * bytes_per_sample) as u64;
    // Overviews add at most a third; deflate may grow incompressible tiles slightly.
    let estimate = full + full / 3 + full / 100 + (1 << 20);
    estimate >= u64::from(u32::MAX)
}

fn geo_entries(georef: &GeoReference) -> Vec<(u16, Value)> {
    vec![
        (33550, Value::Double(vec![georef.scale, georef.scale, 0.0])),
        (
            33922,
            Value::Double(vec![
                0.0,
                0.0,
                0.0,
                georef.translate.0,
                georef.translate.1,
                0.0,
            ]),
        ),
        (
            34735,
            Value::Short(vec![
                1, 1, 0, 3, // version 1.1.0, three keys
                1024, 0, 1, 1, // GTModelType = projected
                1025, 0, 1, 1, // GTRasterType = PixelIsArea
                3072, 0, 1, georef.epsg, // ProjectedCSType
            ]),
        ),
    ]
}

fn write_typed<T: Sample>(path: &Path, data: &[T], layout: &RasterLayout) -> Result<()> {
    let RasterLayout {
        width,
        height,
        samples,
        ..
    } = *layout;
    if width == 0 || height == 0 || samples == 0 {
        return Err(LoopyError::InvalidInput(format!(
            "cannot write an empty raster ({width}×{height}×{samples}) to {}",
            path.display()
        )));
    }
    if data.len() != width * height * samples {
        return Err(LoopyError::InvalidInput(format!(
            "raster data has {} samples, expected {width}×{height}×{samples}",
            data.len()
        )));
    }
    if !layout.compression.supports(T::BITS, samples) {
        return Err(LoopyError::InvalidInput(format!(
            "{:?} cannot encode {samples} {}-bit samples per pixel",
            layout.compression,
            T::BITS
        )));
    }

    let bytes_per_sample = (T::BITS / 8) as usize;
    let big = needs_bigtiff(layout, bytes_per_sample);
    let file = File::create(path).map_err(|e| LoopyError::io_at(path, e))?;
    let mut out = BufWriter::new(file);
    let io = |e: std::io::Error| LoopyError::io_at(path, e);

    // Header; the first-IFD pointer is patched once the IFD is placed.
    let mut next_ptr_at: u64 = if big {
        out.write_all(&[b'I', b'I', 43, 0, 8, 0, 0, 0])
            .map_err(io)?;
        out.write_all(&[0u8; 8]).map_err(io)?;
        8
    } else {
        out.write_all(&[b'I', b'I', 42, 0]).map_err(io)?;
        out.write_all(&[0u8; 4]).map_err(io)?;
        4
    };

    let mut levels = vec![Level {
        data: std::borrow::Cow::Borrowed(data),
        width,
        height,
        overview: false,
    }];
    for &factor in &layout.overviews {
        if factor <= 1 {
            continue;
        }
        let (d, w, h) = decimate(data, width, height, samples, factor as usize);
        levels.push(Level {
            data: std::borrow::Cow::Owned(d),
            width: w,
            height: h,
            overview: true,
        });
    }

    let (photometric, extra) = photometric_for(layout);

    for level in &levels {
        let across = level.width.div_ceil(TILE_SIZE);
        let down = level.height.div_ceil(TILE_SIZE);
        let mut offsets = Vec::with_capacity(across * down);
        let mut counts = Vec::with_capacity(across * down);
        for ty in 0..down {
            for tx in 0..across {
                let raw = tile_bytes(&level.data, level.width, level.height, samples, tx, ty);
                let payload = compress_tile(raw, layout.compression, samples)?;
                offsets.push(out.stream_position().map_err(io)?);
                counts.push(payload.len() as u64);
                out.write_all(&payload).map_err(io)?;
            }
        }

        let mut pos = out.stream_position().map_err(io)?;
        if pos % 2 == 1 {
            out.write_all(&[0]).map_err(io)?;
            pos += 1;
        }

        let mut entries = vec![
            (254, Value::Long(vec![u32::from(level.overview)])),
            (256, Value::Long(vec![level.width as u32])),
            (257, Value::Long(vec![level.height as u32])),
            (258, Value::Short(vec![T::BITS; samples])),
            (259, Value::Short(vec![layout.compression.tag_value()])),
            (262, Value::Short(vec![photometric])),
            (277, Value::Short(vec![samples as u16])),
            (284, Value::Short(vec![1])),
            (322, Value::Long(vec![TILE_SIZE as u32])),
            (323, Value::Long(vec![TILE_SIZE as u32])),
            (324, Value::Offsets(offsets)),
            (325, Value::Offsets(counts)),
            (339, Value::Short(vec![1; samples])),
        ];
        if extra > 0 {
            entries.push((338, Value::Short(vec![0; extra])));
        }
        if photometric == YCBCR {
            // The encoder keeps chroma at full resolution.
            entries.push((530, Value::Short(vec![1, 1])));
        }
        if !level.overview {
            entries.extend(geo_entries(&layout.georef));
        }

        let (ifd, next_at) = encode_ifd(entries, pos, big)?;
        out.write_all(&ifd).map_err(io)?;
        let end = out.stream_position().map_err(io)?;

        out.seek(SeekFrom::Start(next_ptr_at)).map_err(io)?;
        if big {
            out.write_all(&pos.to_le_bytes()).map_err(io)?;
        } else {
            out.write_all(&(pos as u32).to_le_bytes()).map_err(io)?;
        }
        out.seek(SeekFrom::Start(end)).map_err(io)?;
        next_ptr_at = pos + next_at as u64;
    }

    out.flush().map_err(io)?;
    log::debug!(
        "wrote {} ({}×{}×{}, {} overviews{})",
        path.display(),
        width,
        height,
        samples,
        levels.len() - 1,
        if big { ", BigTIFF" } else { "" }
    );
    Ok(())
}

/// Write interleaved `(y, x, sample)` pixels as a tiled GeoTIFF.
pub fn write_geotiff(path: impl AsRef<Path>, pixels: &Interleaved, layout: &RasterLayout) -> Result<()> {
    let path = path.as_ref();
    match pixels {
        Interleaved::U8(v) => write_typed(path, v, layout),
        Interleaved::U16(v) => write_typed(path, v, layout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use ::tiff::decoder::{Decoder, DecodingResult};
    use ::tiff::tags::Tag;
    use ::tiff::ColorType;

    fn layout(width: usize, height: usize, samples: usize) -> RasterLayout {
        RasterLayout {
            width,
            height,
            samples,
            rgb: samples == 3,
            georef: GeoReference {
                scale: 0.5,
                translate: (10.0, 20.0),
                epsg: DEFAULT_EPSG,
            },
            overviews: DEFAULT_OVERVIEWS.to_vec(),
            compression: RasterCompression::Deflate,
        }
    }

    #[test]
    fn test_rgb_tiles_roundtrip_through_decoder() {
        let (w, h) = (300, 270);
        let pixels: Vec<u8> = (0..w * h * 3).map(|i| (i % 251) as u8).collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.tif");
        write_geotiff(&path, &Interleaved::U8(pixels.clone()), &layout(w, h, 3)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let mut dec = Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(dec.dimensions().unwrap(), (w as u32, h as u32));
        assert_eq!(dec.colortype().unwrap(), ColorType::RGB(8));
        match dec.read_image().unwrap() {
            DecodingResult::U8(v) => assert_eq!(v, pixels),
            _ => panic!("expected u8 data"),
        }

        let scale = dec.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap();
        assert_eq!(scale, vec![0.5, 0.5, 0.0]);
        let tie = dec.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap();
        assert_eq!(&tie[3..5], &[10.0, 20.0]);

        let mut sizes = Vec::new();
        while dec.more_images() {
            dec.next_image().unwrap();
            sizes.push(dec.dimensions().unwrap());
        }
        assert_eq!(sizes, vec![(75, 68), (38, 34), (19, 17), (10, 9), (5, 5)]);
    }

    #[test]
    fn test_gray16_uncompressed() {
        let (w, h) = (5, 4);
        let pixels: Vec<u16> = (0..(w * h) as u16).map(|i| i * 1000).collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.tif");
        let mut l = layout(w, h, 1);
        l.compression = RasterCompression::None;
        l.overviews.clear();
        write_geotiff(&path, &Interleaved::U16(pixels.clone()), &l).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let mut dec = Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(dec.colortype().unwrap(), ColorType::Gray(16));
        match dec.read_image().unwrap() {
            DecodingResult::U16(v) => assert_eq!(v, pixels),
            _ => panic!("expected u16 data"),
        }
        assert!(!dec.more_images());
    }

    fn tile_payloads(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut dec = Decoder::new(Cursor::new(bytes.to_vec())).unwrap();
        let offsets = dec.get_tag_u64_vec(Tag::TileOffsets).unwrap();
        let counts = dec.get_tag_u64_vec(Tag::TileByteCounts).unwrap();
        offsets
            .iter()
            .zip(&counts)
            .map(|(&o, &c)| bytes[o as usize..(o + c) as usize].to_vec())
            .collect()
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|i| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                ((state >> 24) as u8 / 2).wrapping_add((i % 128) as u8)
            })
            .collect()
    }

    #[test]
    fn test_gray8_jpeg_tiles() {
        let (w, h) = (300, 200);
        let pixels = noise(w * h);
        let dir = tempfile::tempdir().unwrap();
        let mut sizes = Vec::new();
        for quality in [50, 95] {
            let path = dir.path().join(format!("q{quality}.tif"));
            let mut l = layout(w, h, 1);
            l.compression = RasterCompression::Jpeg { quality };
            write_geotiff(&path, &Interleaved::U8(pixels.clone()), &l).unwrap();

            let bytes = std::fs::read(&path).unwrap();
            let mut dec = Decoder::new(Cursor::new(bytes.clone())).unwrap();
            assert_eq!(dec.get_tag_u32(Tag::Compression).unwrap(), 7);
            assert_eq!(dec.get_tag_u32(Tag::PhotometricInterpretation).unwrap(), 1);

            let tiles = tile_payloads(&bytes);
            assert_eq!(tiles.len(), 2);
            for tile in &tiles {
                assert_eq!(&tile[..2], &[0xFF, 0xD8]);
                let img = image::load_from_memory_with_format(tile, image::ImageFormat::Jpeg).unwrap();
                assert_eq!((img.width(), img.height()), (256, 256));
            }
            sizes.push(bytes.len());
        }
        assert!(sizes[0] < sizes[1], "quality 50 should be smaller: {sizes:?}");
    }

    #[test]
    fn test_three_sample_jpeg_is_ycbcr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group.tif");
        let mut l = layout(20, 10, 3);
        l.rgb = false;
        l.overviews.clear();
        l.compression = RasterCompression::Jpeg { quality: 90 };
        write_geotiff(&path, &Interleaved::U8(noise(20 * 10 * 3)), &l).unwrap();

        let mut dec = Decoder::new(Cursor::new(std::fs::read(&path).unwrap())).unwrap();
        assert_eq!(dec.get_tag_u32(Tag::Compression).unwrap(), 7);
        assert_eq!(dec.get_tag_u32(Tag::PhotometricInterpretation).unwrap(), 6);
        assert_eq!(dec.get_tag_u32_vec(Tag::Unknown(530)).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_jpeg_rejects_unsupported_rasters() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = layout(2, 2, 2);
        l.compression = RasterCompression::Jpeg { quality: 90 };
        let err = write_geotiff(dir.path().join("a.tif"), &Interleaved::U8(vec![0; 8]), &l)
            .unwrap_err();
        assert!(err.to_string().contains("cannot encode 2 8-bit samples"));

        let mut l = layout(2, 2, 1);
        l.compression = RasterCompression::Jpeg { quality: 90 };
        assert!(write_geotiff(dir.path().join("b.tif"), &Interleaved::U16(vec![0; 4]), &l).is_err());
        assert!(RasterCompression::Deflate.supports(16, 4));
    }

    #[test]
    fn test_channel_group_is_minisblack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group.tif");
        let mut l = layout(4, 4, 3);
        l.rgb = false;
        l.overviews.clear();
        write_geotiff(&path, &Interleaved::U8(vec![1; 4 * 4 * 3]), &l).unwrap();

        let mut dec = Decoder::new(Cursor::new(std::fs::read(&path).unwrap())).unwrap();
        assert_eq!(dec.get_tag_u32(Tag::PhotometricInterpretation).unwrap(), 1);
        assert_eq!(dec.get_tag_u32_vec(Tag::ExtraSamples).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_decimate_picks_centre_sample() {
        let data: Vec<u8> = (0..16).collect();
        let (out, w, h) = decimate(&data, 4, 4, 1, 4);
        assert_eq!((w, h), (1, 1));
        assert_eq!(out, vec![10]);

        let (out, w, h) = decimate(&data, 4, 4, 1, 3);
        assert_eq!((w, h), (2, 2));
        assert_eq!(out, vec![5, 7, 13, 15]);
    }

    #[test]
    fn test_tile_padding() {
        let data = vec![7u8; 3 * 2];
        let tile = tile_bytes(&data, 3, 2, 1, 0, 0);
        assert_eq!(tile.len(), TILE_SIZE * TILE_SIZE);
        assert_eq!(&tile[..4], &[7, 7, 7, 0]);
        assert_eq!(&tile[TILE_SIZE..TILE_SIZE + 4], &[7, 7, 7, 0]);
        assert!(tile[2 * TILE_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_geotiff(
            dir.path().join("bad.tif"),
            &Interleaved::U8(vec![0; 5]),
            &layout(2, 2, 1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected 2×2×1"));
    }

    #[test]
    fn test_transform() {
        let g = GeoReference {
            scale: 2.0,
            translate: (1.0, 3.0),
            epsg: 4326,
        };
        assert_eq!(g.transform(), [2.0, 0.0, 1.0, 0.0, -2.0, 3.0]);
    }
}
