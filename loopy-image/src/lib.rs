//! Multi-channel image tiling for Loopy sample bundles.
//!
//! An arbitrary-channel scientific image is normalized to `(C, H, W)`, split
//! into groups of at most three channels, and written as one tiled,
//! georeferenced GeoTIFF with an overview pyramid per group.
//!
//! # Quick start
//!
//! ```
//! use loopy_image::{GeoTiff, SourceOptions, TileConfig};
//! use loopy_io::ImageArray;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let img = ImageArray::U8(ArrayD::zeros(IxDyn(&[5, 32, 32])));
//! let job = GeoTiff::from_array(img, SourceOptions::default())
//!     .unwrap()
//!     .plan("/tmp/out/image.tif", TileConfig::default())
//!     .unwrap();
//! assert_eq!(job.names(), vec!["image.tif", "image_1.tif"]);
//! ```

pub mod compress;
pub mod config;
pub mod groups;
pub mod normalize;
pub mod tiler;

// Re-exports for convenience.

pub use compress::{finalize, gdal_args, intermediate_path};
pub use config::{Compressor, TileConfig, DEFAULT_GROUP_SIZE, DEFAULT_QUALITY};
pub use groups::{channel_groups, ChannelGroup, MAX_CHANNELS};
pub use normalize::{normalize_shape, ChannelAxis, ChannelStack, ImageShape};
pub use tiler::{GeoTiff, SourceOptions, TileJob};
