//! Feature matrix encoders.
//!
//! A joined entity × feature table is written either as one plain CSV or as
//! a chunked store: independently compressed records behind a
//! [`ChunkedHeader`]. Chunked records are small CSV documents the viewer
//! parses with a header row:
//!
//! - dense: one record per column, `<name>\n<v0>\n<v1>...`
//! - csc: one record per column, `index,value` rows with row positions
//! - csr: one record per row, `index,value` rows with column positions
//!
//! Numeric values are rounded to 3 decimals before encoding.

use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use loopy_core::{Algorithm, ChunkedBlob, LoopyError, Result};
use loopy_io::{ColumnData, Table};

use crate::header::{ChunkedHeader, SparseMode};
use crate::sparse::SparseMatrix;

/// Chunks processed between two progress messages.
pub const PROGRESS_EVERY: usize = 1000;

/// Index label of plain feature CSVs.
pub const INDEX_LABEL: &str = "id";

/// Axis along which a sparse table is chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SparseLayout {
    /// One chunk per feature column.
    #[default]
    Csc,
    /// One chunk per entity row.
    Csr,
}

impl FromStr for SparseLayout {
    type Err = LoopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csc" => Ok(SparseLayout::Csc),
            "csr" => Ok(SparseLayout::Csr),
            other => Err(LoopyError::InvalidInput(format!(
                "invalid mode '{other}', expected 'csc' or 'csr'"
            ))),
        }
    }
}

/// Round to 3 decimal places.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn format_value(x: f64) -> String {
    if x.is_nan() {
        String::new()
    } else {
        round3(x).to_string()
    }
}

fn dense_record(name: &str, column: &ColumnData) -> Vec<u8> {
    let mut out = String::with_capacity(name.len() + column.len() * 4);
    out.push_str(name);
    out.push('\n');
    for row in 0..column.len() {
        match column {
            ColumnData::Numeric(v) => out.push_str(&format_value(v[row])),
            other => out.push_str(&other.text(row).unwrap_or_default()),
        }
        out.push('\n');
    }
    out.into_bytes()
}

fn sparse_record(indices: &[usize], values: &[f64]) -> Option<Vec<u8>> {
    if indices.is_empty() {
        return None;
    }
    let mut out = String::from("index,value\n");
    for (i, &v) in indices.iter().zip(values) {
        out.push_str(&i.to_string());
        out.push(',');
        out.push_str(&format_value(v));
        out.push('\n');
    }
    Some(out.into_bytes())
}

/// Build `n` records with `make`, reporting progress every
/// [`PROGRESS_EVERY`] records, then compress them into one blob.
fn encode_records<F>(
    n: usize,
    make: F,
    algorithm: Algorithm,
    progress: &mut dyn FnMut(&str),
) -> Result<ChunkedBlob>
where
    F: Fn(usize) -> Option<Vec<u8>> + Sync,
{
    let mut records: Vec<Option<Vec<u8>>> = Vec::with_capacity(n);
    for start in (0..n).step_by(PROGRESS_EVERY) {
        let end = (start + PROGRESS_EVERY).min(n);
        #[cfg(feature = "parallel")]
        records.par_extend((start..end).into_par_iter().map(&make));
        #[cfg(not(feature = "parallel"))]
        records.extend((start..end).map(&make));
        if end - start == PROGRESS_EVERY {
            progress(&format!("Processed {end}/{n} chunks"));
        }
    }

    progress("Concatenating and compressing chunks");

    #[cfg(feature = "parallel")]
    {
        let compressed = records
            .into_par_iter()
            .map(|r| r.map(|b| algorithm.compress(&b)).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(ChunkedBlob::from_compressed(compressed))
    }
    #[cfg(not(feature = "parallel"))]
    {
        loopy_core::concat(records, algorithm)
    }
}

fn column_names(table: &Table) -> Vec<String> {
    table
        .column_names()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Write the whole table as one CSV, ids first.
pub fn write_plain_csv(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    loopy_io::write_table(table, INDEX_LABEL, path)
}

/// Chunk a table by column without sparsification.
///
/// Any column type is accepted; the header's `length` is the entity count.
pub fn compress_chunked_features(
    table: &Table,
    algorithm: Algorithm,
    progress: &mut dyn FnMut(&str),
) -> Result<(ChunkedHeader, ChunkedBlob)> {
    let columns = table.columns();
    let blob = encode_records(
        columns.len(),
        |i| {
            let (name, column) = &columns[i];
            Some(dense_record(name, column))
        },
        algorithm,
        progress,
    )?;

    let header = ChunkedHeader {
        names: Some(column_names(table)),
        ptr: blob.ptr.clone(),
        length: table.n_rows(),
        active_default: None,
        sparse_mode: None,
        coord_name: None,
    };
    Ok((header, blob))
}

/// Chunk an all-numeric table sparsely along `layout`.
///
/// An all-zero lane becomes an absent record. In [`SparseLayout::Csc`] the
/// header `length` is the entity count and the mode is
/// [`SparseMode::Array`]; in [`SparseLayout::Csr`] it is the feature count and
/// the mode is [`SparseMode::Record`].
pub fn sparse_compress_chunked_features(
    table: &Table,
    layout: SparseLayout,
    algorithm: Algorithm,
    progress: &mut dyn FnMut(&str),
) -> Result<(ChunkedHeader, ChunkedBlob)> {
    let matrix = SparseMatrix::from_table(table)?;
    let (n_rows, n_cols) = matrix.shape();
    let (lanes, length, mode) = match layout {
        SparseLayout::Csc => (matrix.to_csc(), n_rows, SparseMode::Array),
        SparseLayout::Csr => (matrix.to_csr(), n_cols, SparseMode::Record),
    };

    let blob = encode_records(
        lanes.n_lanes(),
        |i| {
            let (indices, values) = lanes.lane(i);
            sparse_record(indices, values)
        },
        algorithm,
        progress,
    )?;

    let header = ChunkedHeader {
        names: Some(column_names(table)),
        ptr: blob.ptr.clone(),
        length,
        active_default: None,
        sparse_mode: Some(mode),
        coord_name: None,
    };
    Ok((header, blob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopy_core::compress::gzip_decompress;

    fn frame(cols: &[(&str, Vec<f64>)]) -> Table {
        let n = cols.first().map_or(0, |(_, v)| v.len());
        cols.iter().fold(
            Table::new((0..n).map(|i| format!("e{i}")).collect()),
            |t, (name, v)| t.with_column(*name, ColumnData::Numeric(v.clone())).unwrap(),
        )
    }

    fn chunk(blob: &ChunkedBlob, i: usize) -> String {
        let range = blob.range(i).unwrap();
        String::from_utf8(gzip_decompress(&blob.bytes[range]).unwrap()).unwrap()
    }

    #[test]
    fn test_dense_chunks_one_column_each() {
        let df = frame(&[("a", vec![1.0, 2.0]), ("b", vec![3.0, 4.0])]);
        let mut logs = Vec::new();
        let (header, blob) =
            compress_chunked_features(&df, Algorithm::Gzip, &mut |m| logs.push(m.to_string()))
                .unwrap();

        assert_eq!(header.names, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(header.length, 2);
        assert_eq!(header.ptr.len(), 3);
        assert_eq!(header.sparse_mode, None);
        assert_eq!(logs.last().unwrap(), "Concatenating and compressing chunks");
        assert_eq!(chunk(&blob, 0), "a\n1\n2\n");
        assert_eq!(chunk(&blob, 1), "b\n3\n4\n");
    }

    #[test]
    fn test_dense_keeps_text_columns() {
        let df = Table::new(vec!["e0".into(), "e1".into()])
            .with_column(
                "cluster",
                ColumnData::Categorical {
                    codes: vec![1, 0],
                    categories: vec!["T".into(), "B".into()],
                },
            )
            .unwrap();
        let (_, blob) = compress_chunked_features(&df, Algorithm::Gzip, &mut |_| {}).unwrap();
        assert_eq!(chunk(&blob, 0), "cluster\nB\nT\n");
    }

    #[test]
    fn test_csc_handles_empty_columns() {
        let df = frame(&[
            ("a", vec![0.0, 1.0, 0.0]),
            ("b", vec![2.0, 0.0, 3.0]),
            ("c", vec![0.0, 0.0, 0.0]),
        ]);
        let (header, blob) =
            sparse_compress_chunked_features(&df, SparseLayout::Csc, Algorithm::Gzip, &mut |_| {})
                .unwrap();

        assert_eq!(header.length, 3);
        assert_eq!(header.sparse_mode, Some(SparseMode::Array));
        assert_eq!(header.ptr.len(), 4);
        assert_eq!(chunk(&blob, 0), "index,value\n1,1\n");
        assert_eq!(chunk(&blob, 1), "index,value\n0,2\n2,3\n");
        assert_eq!(header.ptr[2], header.ptr[3]);
    }

    #[test]
    fn test_csr_records_rows() {
        let df = frame(&[("a", vec![0.0, 1.0, 0.0]), ("b", vec![2.0, 0.0, 3.0])]);
        let (header, blob) =
            sparse_compress_chunked_features(&df, SparseLayout::Csr, Algorithm::Gzip, &mut |_| {})
                .unwrap();

        assert_eq!(header.length, 2);
        assert_eq!(header.sparse_mode, Some(SparseMode::Record));
        assert_eq!(header.ptr.len(), 4);
        let first = chunk(&blob, 0);
        assert_eq!(first.trim().lines().nth(1), Some("1,2"));
    }

    #[test]
    fn test_values_rounded_to_three_decimals() {
        let df = frame(&[("a", vec![0.12345, 2.0004])]);
        let (_, blob) =
            sparse_compress_chunked_features(&df, SparseLayout::Csc, Algorithm::Gzip, &mut |_| {})
                .unwrap();
        assert_eq!(chunk(&blob, 0), "index,value\n0,0.123\n1,2\n");
    }

    #[test]
    fn test_progress_every_thousand_chunks() {
        let df = frame(&[("a", vec![1.0; 2500]), ("b", vec![0.0; 2500])]);
        let mut logs = Vec::new();
        sparse_compress_chunked_features(&df, SparseLayout::Csr, Algorithm::Gzip, &mut |m| {
            logs.push(m.to_string())
        })
        .unwrap();
        assert_eq!(
            logs,
            vec![
                "Processed 1000/2500 chunks",
                "Processed 2000/2500 chunks",
                "Concatenating and compressing chunks",
            ]
        );
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("csr".parse::<SparseLayout>().unwrap(), SparseLayout::Csr);
        let err = "coo".parse::<SparseLayout>().unwrap_err();
        assert!(err.to_string().contains("invalid mode"));
    }

    #[test]
    fn test_plain_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene.csv");
        let df = Table::new(vec!["a".into(), "b".into()])
            .with_column("gene", ColumnData::Numeric(vec![3.0, 5.0]))
            .unwrap();
        write_plain_csv(&df, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "id,gene\na,3.000000e+00\nb,5.000000e+00\n"
        );
    }
}
