//! In-memory source images.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Element type of a source image. Only unsigned 8- and 16-bit data is
/// accepted anywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Uint8,
    Uint16,
}

impl Dtype {
    /// Bits per sample.
    pub fn bits(self) -> u16 {
        match self {
            Dtype::Uint8 => 8,
            Dtype::Uint16 => 16,
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dtype::Uint8 => write!(f, "uint8"),
            Dtype::Uint16 => write!(f, "uint16"),
        }
    }
}

/// A 2-D or 3-D image array in whatever axis order the source used.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageArray {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
}

impl ImageArray {
    /// Shape of the underlying array.
    pub fn shape(&self) -> &[usize] {
        match self {
            ImageArray::U8(a) => a.shape(),
            ImageArray::U16(a) => a.shape(),
        }
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        match self {
            ImageArray::U8(_) => Dtype::Uint8,
            ImageArray::U16(_) => Dtype::Uint16,
        }
    }

    /// Largest value present, 0 for an empty array.
    pub fn max_value(&self) -> u32 {
        match self {
            ImageArray::U8(a) => a.iter().copied().max().unwrap_or(0) as u32,
            ImageArray::U16(a) => a.iter().copied().max().unwrap_or(0) as u32,
        }
    }
}

/// Pixel data of one written raster, interleaved row-major `(y, x, sample)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Interleaved {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl Interleaved {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Interleaved::U8(v) => v.len(),
            Interleaved::U16(v) => v.len(),
        }
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        match self {
            Interleaved::U8(_) => Dtype::Uint8,
            Interleaved::U16(_) => Dtype::Uint16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_max_value_and_dtype() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1u16, 700, 3, 4]).unwrap();
        let img = ImageArray::U16(arr);
        assert_eq!(img.dtype(), Dtype::Uint16);
        assert_eq!(img.max_value(), 700);
        assert_eq!(img.shape(), &[2, 2]);
    }

    #[test]
    fn test_dtype_serde() {
        assert_eq!(serde_json::to_string(&Dtype::Uint8).unwrap(), "\"uint8\"");
        assert_eq!(Dtype::Uint16.to_string(), "uint16");
    }
}
