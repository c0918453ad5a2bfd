//! File formats for the Loopy bundle pipeline.
//!
//! - **Tables** — [`Table`], the string-indexed column store every registration takes
//! - **CSV** — coordinate and feature tables, via the `csv` feature (enabled by default)
//! - **TIFF** — source image decoding, via the `tiff` feature (enabled by default)
//! - **GeoTIFF** — tiled, georeferenced output rasters with overview pyramids

pub mod geotiff;
pub mod raster;
pub mod table;

#[cfg(feature = "csv")]
pub mod csv;

#[cfg(feature = "tiff")]
pub mod tiff;

// Re-exports for convenience.

pub use geotiff::{
    write_geotiff, GeoReference, RasterCompression, RasterLayout, DEFAULT_EPSG, DEFAULT_OVERVIEWS,
    TILE_SIZE,
};
pub use raster::{Dtype, ImageArray, Interleaved};
pub use table::{ColumnData, Table};

#[cfg(feature = "csv")]
pub use self::csv::{format_sci, read_table, write_table, write_table_to};

#[cfg(feature = "tiff")]
pub use self::tiff::read_tiff;
