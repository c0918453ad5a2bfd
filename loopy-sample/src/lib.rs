//! Building Loopy sample bundles.
//!
//! A sample bundle is a directory holding `sample.json` plus the files it
//! references: coordinate CSVs, plain or chunked feature stores, and tiled
//! GeoTIFF images. [`Sample`] validates each registration as it is made and
//! writes the files when the sample is committed.
//!
//! # Quick start
//!
//! ```no_run
//! use loopy_io::{ColumnData, Table};
//! use loopy_sample::{DataType, Sample, DEFAULT_MARKER_SIZE};
//!
//! let ids = vec!["a".to_string(), "b".to_string()];
//! let spots = Table::new(ids.clone())
//!     .with_column("x", ColumnData::Numeric(vec![0.0, 1.0]))?
//!     .with_column("y", ColumnData::Numeric(vec![1.0, 2.0]))?;
//! let gene = Table::new(ids).with_column("gene", ColumnData::Numeric(vec![3.0, 5.0]))?;
//!
//! Sample::bind(Some("sample1"), "out/sample1")?
//!     .add_coords(spots, "spots", 1.0, DEFAULT_MARKER_SIZE)?
//!     .add_csv_feature(gene, "gene", "spots", DataType::Quantitative)?
//!     .write()?;
//! # Ok::<(), loopy_core::LoopyError>(())
//! ```

pub mod params;
pub mod queue;
pub mod sample;
pub mod url;

// Re-exports for convenience.

pub use params::{
    Channels, ChunkedCsvParams, Color, CoordParams, DataType, FeatureAndGroup, FeatureParams,
    ImageParams, OverlayParams, PlainCsvParams, SampleManifest, Shape,
};
pub use queue::ActionQueue;
pub use sample::{
    ChunkedOptions, ImageOptions, Markdown, Sample, SampleOptions, DEFAULT_MARKER_SIZE,
    MANIFEST_FILE,
};
pub use url::{Url, UrlKind};
