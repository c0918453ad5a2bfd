//! Source TIFF decoding.
//!
//! Microscopy exports come in three shapes, and all of them are returned
//! as-is so the image pipeline can decide the axis order:
//!
//! - several same-sized grayscale pages → `(C, H, W)` (ImageJ/tifffile stacks)
//! - one page with several samples per pixel → `(H, W, C)`
//! - one grayscale page → `(H, W)`
//!
//! Pages that differ in size from the first are reduced-resolution copies and
//! are skipped.

use std::io::Cursor;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use ::tiff::decoder::{Decoder, DecodingResult, Limits};
use ::tiff::ColorType;

use loopy_core::mmap::MappedFile;
use loopy_core::{LoopyError, Result};

use crate::raster::ImageArray;

fn tiff_err(path: &Path, e: ::tiff::TiffError) -> LoopyError {
    match e {
        ::tiff::TiffError::IoError(io) => LoopyError::io_at(path, io),
        other => LoopyError::Parse(format!("{}: {other}", path.display())),
    }
}

fn samples_per_pixel(path: &Path, color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        other => Err(LoopyError::InvalidInput(format!(
            "{}: unsupported color type {other:?}",
            path.display()
        ))),
    }
}

fn result_dtype(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U8(_) => "uint8",
        DecodingResult::U16(_) => "uint16",
        DecodingResult::U32(_) => "uint32",
        DecodingResult::U64(_) => "uint64",
        DecodingResult::I8(_) => "int8",
        DecodingResult::I16(_) => "int16",
        DecodingResult::I32(_) => "int32",
        DecodingResult::I64(_) => "int64",
        DecodingResult::F32(_) => "float32",
        DecodingResult::F64(_) => "float64",
        #[allow(unreachable_patterns)]
        _ => "unknown",
    }
}

enum Pages {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

/// Decode the full-resolution image of a TIFF file.
///
/// Returns [`LoopyError::InvalidInput`] for any element type other than
/// unsigned 8 or 16 bit.
pub fn read_tiff(path: impl AsRef<Path>) -> Result<ImageArray> {
    let path = path.as_ref();
    let mapped = MappedFile::open(path)?;
    let mut decoder = Decoder::new(Cursor::new(mapped.as_bytes()))
        .map_err(|e| tiff_err(path, e))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(|e| tiff_err(path, e))?;
    let samples = samples_per_pixel(path, decoder.colortype().map_err(|e| tiff_err(path, e))?)?;

    let mut pages: Option<Pages> = None;
    let mut n_pages = 0usize;
    loop {
        let result = decoder.read_image().map_err(|e| tiff_err(path, e))?;
        pages = match (pages.take(), result) {
            (None, DecodingResult::U8(v)) => Some(Pages::U8(v)),
            (None, DecodingResult::U16(v)) => Some(Pages::U16(v)),
            (Some(Pages::U8(mut acc)), DecodingResult::U8(v)) => {
                acc.extend_from_slice(&v);
                Some(Pages::U8(acc))
            }
            (Some(Pages::U16(mut acc)), DecodingResult::U16(v)) => {
                acc.extend_from_slice(&v);
                Some(Pages::U16(acc))
            }
            (_, other) => {
                return Err(LoopyError::InvalidInput(format!(
                    "{}: unsupported dtype {} (expected uint8 or uint16 on every page)",
                    path.display(),
                    result_dtype(&other)
                )))
            }
        };
        n_pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| tiff_err(path, e))?;
        if decoder.dimensions().map_err(|e| tiff_err(path, e))? != (width, height) {
            break;
        }
        let next_samples =
            samples_per_pixel(path, decoder.colortype().map_err(|e| tiff_err(path, e))?)?;
        if samples != 1 || next_samples != 1 {
            return Err(LoopyError::InvalidInput(format!(
                "{}: multi-page TIFF with {samples} samples per pixel is not supported",
                path.display()
            )));
        }
    }

    let (h, w) = (height as usize, width as usize);
    let shape: Vec<usize> = match (n_pages, samples) {
        (1, 1) => vec![h, w],
        (1, s) => vec![h, w, s],
        (n, _) => vec![n, h, w],
    };

    let shape_err = |e: ndarray::ShapeError| {
        LoopyError::Parse(format!("{}: {e}", path.display()))
    };
    match pages {
        Some(Pages::U8(v)) => Ok(ImageArray::U8(
            ArrayD::from_shape_vec(IxDyn(&shape), v).map_err(shape_err)?,
        )),
        Some(Pages::U16(v)) => Ok(ImageArray::U16(
            ArrayD::from_shape_vec(IxDyn(&shape), v).map_err(shape_err)?,
        )),
        None => Err(LoopyError::Parse(format!(
            "{}: no image data",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use ::tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn test_read_single_gray_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.tif");
        let mut enc = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        enc.write_image::<colortype::Gray16>(3, 2, &[1, 2, 3, 4, 5, 600])
            .unwrap();
        drop(enc);

        let img = read_tiff(&path).unwrap();
        assert_eq!(img.shape(), &[2, 3]);
        assert_eq!(img.max_value(), 600);
    }

    #[test]
    fn test_read_rgb_page_is_channel_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let mut enc = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        enc.write_image::<colortype::RGB8>(2, 2, &[0u8; 12]).unwrap();
        drop(enc);

        let img = read_tiff(&path).unwrap();
        assert_eq!(img.shape(), &[2, 2, 3]);
    }

    #[test]
    fn test_read_stack_is_channel_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        let mut enc = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        for c in 0..5u8 {
            enc.write_image::<colortype::Gray8>(4, 3, &[c; 12]).unwrap();
        }
        drop(enc);

        let img = read_tiff(&path).unwrap();
        assert_eq!(img.shape(), &[5, 3, 4]);
        match img {
            ImageArray::U8(a) => assert_eq!(a[[4, 2, 3]], 4),
            _ => panic!("expected uint8"),
        }
    }

    #[test]
    fn test_float_tiff_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.tif");
        let mut enc = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        enc.write_image::<colortype::Gray32Float>(2, 1, &[0.5, 1.5])
            .unwrap();
        drop(enc);

        let err = read_tiff(&path).unwrap_err();
        assert!(err.to_string().contains("float32"));
    }
}
