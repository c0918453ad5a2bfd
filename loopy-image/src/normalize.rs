//! Bringing source arrays into canonical `(C, H, W)` order.
//!
//! Axis order is inferred from the shape alone:
//!
//! 1. RGB sources must be `(H, W, 3)`.
//! 2. A 2-D array is a single channel.
//! 3. `shape[0] < shape[2]` means channel-first.
//! 4. Anything else is channel-last.

use ndarray::{s, Array3, ArrayD, Axis, Ix3};

use loopy_core::{LoopyError, Result};
use loopy_io::{Dtype, ImageArray, Interleaved};

/// Channel counts above this are probably a mix-up of axes.
pub const CHANNEL_WARN_THRESHOLD: usize = 10;

/// Where the channel axis sits in the source array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAxis {
    /// 2-D source, no channel axis.
    None,
    First,
    Last,
}

/// Dimensions inferred from a source shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub axis: ChannelAxis,
}

/// Infer channel count and axis order from `shape`.
pub fn normalize_shape(shape: &[usize], rgb: bool) -> Result<ImageShape> {
    let inferred = if rgb {
        match shape {
            &[h, w, 3] => ImageShape {
                channels: 3,
                height: h,
                width: w,
                axis: ChannelAxis::Last,
            },
            _ => {
                return Err(LoopyError::InvalidInput(format!(
                    "RGB images must have shape (H, W, 3), got {shape:?}"
                )))
            }
        }
    } else {
        match shape {
            &[h, w] => ImageShape {
                channels: 1,
                height: h,
                width: w,
                axis: ChannelAxis::None,
            },
            &[a, b, c] if a < c => ImageShape {
                channels: a,
                height: b,
                width: c,
                axis: ChannelAxis::First,
            },
            &[a, b, c] => ImageShape {
                channels: c,
                height: a,
                width: b,
                axis: ChannelAxis::Last,
            },
            _ => {
                return Err(LoopyError::InvalidInput(format!(
                    "images must be 2-D or 3-D, got shape {shape:?}"
                )))
            }
        }
    };

    if inferred.channels > CHANNEL_WARN_THRESHOLD {
        log::warn!(
            "image has {} channels; check that the axis order of shape {shape:?} is right",
            inferred.channels
        );
    }
    Ok(inferred)
}

fn to_chw<T: Clone>(arr: ArrayD<T>, shape: &ImageShape) -> Result<Array3<T>> {
    let dim_err = |e: ndarray::ShapeError| LoopyError::InvalidInput(format!("image shape: {e}"));
    let arr = match shape.axis {
        ChannelAxis::None => arr.insert_axis(Axis(0)).into_dimensionality::<Ix3>(),
        ChannelAxis::First => arr.into_dimensionality::<Ix3>(),
        ChannelAxis::Last => arr
            .into_dimensionality::<Ix3>()
            .map(|a| a.permuted_axes([2, 0, 1])),
    }
    .map_err(dim_err)?;
    Ok(arr.as_standard_layout().into_owned())
}

/// A channel-first image stack.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelStack {
    U8(Array3<u8>),
    U16(Array3<u16>),
}

impl ChannelStack {
    /// Reorder `img` to `(C, H, W)` according to `shape`.
    pub fn from_image(img: ImageArray, shape: &ImageShape) -> Result<Self> {
        match img {
            ImageArray::U8(a) => Ok(ChannelStack::U8(to_chw(a, shape)?)),
            ImageArray::U16(a) => Ok(ChannelStack::U16(to_chw(a, shape)?)),
        }
    }

    /// (channels, height, width).
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            ChannelStack::U8(a) => a.dim(),
            ChannelStack::U16(a) => a.dim(),
        }
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            ChannelStack::U8(_) => Dtype::Uint8,
            ChannelStack::U16(_) => Dtype::Uint16,
        }
    }

    /// Largest value present.
    pub fn max_value(&self) -> u32 {
        match self {
            ChannelStack::U8(a) => a.iter().copied().max().unwrap_or(0) as u32,
            ChannelStack::U16(a) => a.iter().copied().max().unwrap_or(0) as u32,
        }
    }

    /// Reduce 16-bit data to 8 bits by the power-of-two shift that maps the
    /// brightest pixel into `128..=255`. 8-bit data is returned unchanged.
    pub fn into_8bit(self) -> Self {
        match self {
            ChannelStack::U8(_) => self,
            ChannelStack::U16(a) => {
                let max = a.iter().copied().max().unwrap_or(0);
                let bits = 16 - max.leading_zeros();
                let shift = bits.saturating_sub(8);
                log::warn!(
                    "converting 16-bit image to 8-bit (max {max}, shift {shift}); this is lossy"
                );
                ChannelStack::U8(a.mapv(|v| (v >> shift).min(255) as u8))
            }
        }
    }

    /// Channels `start..start + len`, interleaved as `(y, x, channel)`.
    pub fn interleave(&self, start: usize, len: usize) -> Interleaved {
        match self {
            ChannelStack::U8(a) => Interleaved::U8(
                a.slice(s![start..start + len, .., ..])
                    .permuted_axes([1, 2, 0])
                    .iter()
                    .copied()
                    .collect(),
            ),
            ChannelStack::U16(a) => Interleaved::U16(
                a.slice(s![start..start + len, .., ..])
                    .permuted_axes([1, 2, 0])
                    .iter()
                    .copied()
                    .collect(),
            ),
        }
    }
}
