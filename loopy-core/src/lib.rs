//! Shared primitives for building Loopy sample bundles.
//!
//! `loopy-core` provides the foundation that the other Loopy crates build on:
//!
//! - **Error types** — [`LoopyError`] and [`Result`] for structured error handling
//! - **Compression** — gzip and zstd with algorithm auto-detection
//! - **Chunk codec** — [`ChunkedBlob`], independently compressed records behind an offset index
//! - **Memory mapping** — Zero-copy reads of written chunk blobs and source rasters
//!
//! # Quick start
//!
//! ```
//! use loopy_core::chunk::concat;
//! use loopy_core::compress::Algorithm;
//!
//! let blob = concat([Some(b"a".to_vec()), None, Some(b"bc".to_vec())], Algorithm::Gzip).unwrap();
//! assert_eq!(blob.ptr.len(), 4);
//! assert_eq!(blob.ptr[1], blob.ptr[2]);
//! assert_eq!(blob.record(2).unwrap().as_deref(), Some(&b"bc"[..]));
//! ```

pub mod error;
pub mod traits;

#[cfg(feature = "std")]
pub mod compress;

#[cfg(feature = "std")]
pub mod chunk;

#[cfg(feature = "std")]
pub mod mmap;

pub use error::{LoopyError, Result};
pub use traits::*;

#[cfg(feature = "std")]
pub use chunk::{concat, concat_csv, concat_json, ChunkedBlob};
#[cfg(feature = "std")]
pub use compress::Algorithm;
