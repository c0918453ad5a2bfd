//! Sparse view of a numeric feature table.
//!
//! [`SparseMatrix`] keeps the non-zero cells of an entity × feature table as
//! `(row, col, value)` triplets, the natural shape of spatial count matrices.
//! The chunked encoder compresses it along either axis: [`SparseMatrix::to_csc`]
//! yields one lane per feature column, [`SparseMatrix::to_csr`] one lane per
//! entity row.

use loopy_core::{LoopyError, Result, Summarizable};
use loopy_io::{ColumnData, Table};

/// A sparse matrix in COO (coordinate) format.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

/// A matrix compressed along one axis.
///
/// Lane `i` holds `indices[indptr[i]..indptr[i + 1]]` (positions along the
/// other axis, ascending) and the matching `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Compressed {
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl Compressed {
    /// Number of lanes.
    pub fn n_lanes(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    /// Indices and values of lane `i`.
    pub fn lane(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[range.clone()], &self.values[range])
    }
}

/// Fail unless every column of `table` is numeric, as sparse encoding needs.
pub fn check_numeric(table: &Table) -> Result<()> {
    match table
        .columns()
        .iter()
        .find(|(_, c)| !matches!(c, ColumnData::Numeric(_)))
    {
        Some((name, _)) => Err(LoopyError::InvalidInput(format!(
            "sparse encoding needs numeric columns, '{name}' is not numeric"
        ))),
        None => Ok(()),
    }
}

impl SparseMatrix {
    /// Collect the non-zero cells of a table whose columns are all numeric.
    ///
    /// `NaN` is not zero and is kept.
    pub fn from_table(table: &Table) -> Result<Self> {
        check_numeric(table)?;
        let (n_rows, n_cols) = table.shape();
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut values = Vec::new();

        for (c, (_, column)) in table.columns().iter().enumerate() {
            let ColumnData::Numeric(v) = column else {
                continue;
            };
            for (r, &x) in v.iter().enumerate() {
                if x != 0.0 {
                    rows.push(r);
                    cols.push(c);
                    values.push(x);
                }
            }
        }

        Ok(Self {
            rows,
            cols,
            values,
            n_rows,
            n_cols,
        })
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Fraction of entries that are stored: `nnz / (n_rows * n_cols)`.
    pub fn density(&self) -> f64 {
        let total = self.n_rows as f64 * self.n_cols as f64;
        if total == 0.0 {
            return 0.0;
        }
        self.values.len() as f64 / total
    }

    /// (n_rows, n_cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    fn compress(&self, major: &[usize], minor: &[usize], n_major: usize) -> Compressed {
        let nnz = self.values.len();
        let mut order: Vec<usize> = (0..nnz).collect();
        order.sort_by_key(|&i| (major[i], minor[i]));

        let mut values = Vec::with_capacity(nnz);
        let mut indices = Vec::with_capacity(nnz);
        let mut indptr = vec![0usize; n_major + 1];

        for &i in &order {
            values.push(self.values[i]);
            indices.push(minor[i]);
            indptr[major[i] + 1] += 1;
        }
        for i in 1..=n_major {
            indptr[i] += indptr[i - 1];
        }

        Compressed {
            indptr,
            indices,
            values,
        }
    }

    /// One lane per row; indices are column positions.
    pub fn to_csr(&self) -> Compressed {
        self.compress(&self.rows, &self.cols, self.n_rows)
    }

    /// One lane per column; indices are row positions.
    pub fn to_csc(&self) -> Compressed {
        self.compress(&self.cols, &self.rows, self.n_cols)
    }

    /// Iterate over stored triplets `(row, col, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.values.iter())
            .map(|((&r, &c), &v)| (r, c, v))
    }
}

impl Summarizable for SparseMatrix {
    fn summary(&self) -> String {
        format!(
            "SparseMatrix: {}\u{00d7}{}, {} nonzeros ({:.2}% density)",
            self.n_rows,
            self.n_cols,
            self.nnz(),
            self.density() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        // a: [0, 1, 0], b: [2, 0, 3], c: [0, 0, 0]
        Table::new(vec!["r0".into(), "r1".into(), "r2".into()])
            .with_column("a", ColumnData::Numeric(vec![0.0, 1.0, 0.0]))
            .unwrap()
            .with_column("b", ColumnData::Numeric(vec![2.0, 0.0, 3.0]))
            .unwrap()
            .with_column("c", ColumnData::Numeric(vec![0.0; 3]))
            .unwrap()
    }

    #[test]
    fn test_from_table_keeps_non_zero() {
        let m = SparseMatrix::from_table(&table()).unwrap();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nnz(), 3);
        let cells: Vec<_> = m.iter().collect();
        assert_eq!(cells, vec![(1, 0, 1.0), (0, 1, 2.0), (2, 1, 3.0)]);
    }

    #[test]
    fn test_from_table_rejects_text() {
        let t = Table::new(vec!["a".into()])
            .with_column("label", ColumnData::Strings(vec!["x".into()]))
            .unwrap();
        let err = SparseMatrix::from_table(&t).unwrap_err();
        assert!(err.to_string().contains("'label'"));
        assert!(check_numeric(&table()).is_ok());
    }

    #[test]
    fn test_to_csc_lanes() {
        let csc = SparseMatrix::from_table(&table()).unwrap().to_csc();
        assert_eq!(csc.n_lanes(), 3);
        assert_eq!(csc.lane(0), (&[1usize][..], &[1.0][..]));
        assert_eq!(csc.lane(1), (&[0usize, 2][..], &[2.0, 3.0][..]));
        assert!(csc.lane(2).0.is_empty());
    }

    #[test]
    fn test_to_csr_lanes() {
        let csr = SparseMatrix::from_table(&table()).unwrap().to_csr();
        assert_eq!(csr.indptr, vec![0, 1, 2, 3]);
        assert_eq!(csr.lane(0), (&[1usize][..], &[2.0][..]));
        assert_eq!(csr.lane(1), (&[0usize][..], &[1.0][..]));
    }

    #[test]
    fn test_summary() {
        let m = SparseMatrix::from_table(&table()).unwrap();
        assert_eq!(
            m.summary(),
            "SparseMatrix: 3\u{00d7}3, 3 nonzeros (33.33% density)"
        );
    }
}
