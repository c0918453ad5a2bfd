//! Feature tables for Loopy sample bundles.
//!
//! - **Join engine** — [`join`] aligns a feature table on the ids of a coordinate table
//! - **Encoders** — plain CSV, dense chunked, and sparse chunked (csc / csr) stores
//! - **Headers** — [`ChunkedHeader`], the JSON index next to each `.bin` blob
//! - **Reader** — [`ChunkedReader`], random access into a written store
//!
//! # Quick start
//!
//! ```
//! use loopy_core::Algorithm;
//! use loopy_feature::{sparse_compress_chunked_features, SparseLayout};
//! use loopy_io::{ColumnData, Table};
//!
//! let table = Table::new(vec!["a".into(), "b".into()])
//!     .with_column("gene", ColumnData::Numeric(vec![0.0, 5.0]))
//!     .unwrap();
//! let (header, blob) =
//!     sparse_compress_chunked_features(&table, SparseLayout::Csc, Algorithm::Gzip, &mut |_| {})
//!         .unwrap();
//! assert_eq!(header.length, 2);
//! assert_eq!(blob.record(0).unwrap().unwrap(), b"index,value\n1,5\n");
//! ```

pub mod encode;
pub mod header;
pub mod join;
pub mod reader;
pub mod sparse;

pub use encode::{
    compress_chunked_features, round3, sparse_compress_chunked_features, write_plain_csv,
    SparseLayout,
};
pub use header::{ChunkedHeader, SparseMode};
pub use join::{join, validate_coords, validate_features, JoinConfig, MissingPolicy};
pub use reader::ChunkedReader;
pub use sparse::{check_numeric, Compressed, SparseMatrix};
