//! In-memory entity × column table.
//!
//! [`Table`] is the generic input every registration receives: rows are
//! entities (spots, cells) identified by a unique string id, columns are named
//! coordinates or features. Columns are stored column-major as [`ColumnData`],
//! the way single-cell `obs`/`var` frames are.
//!
//! Missing values are `NaN` for numeric columns and code `-1` for categorical
//! columns.

use std::collections::{HashMap, HashSet};

use loopy_core::{LoopyError, Result, Summarizable};

/// One column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Free-text string values.
    Strings(Vec<String>),
    /// Numeric (f64) values. `NaN` marks a missing value.
    Numeric(Vec<f64>),
    /// Categorical data stored as integer codes indexing into a category list.
    /// Code `-1` marks a missing value.
    Categorical {
        codes: Vec<i32>,
        categories: Vec<String>,
    },
}

impl ColumnData {
    /// Number of elements in this column.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Strings(v) => v.len(),
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Try to get as numeric slice. Returns `None` if not `Numeric`.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the value at `row` is missing.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Strings(_) => false,
            ColumnData::Numeric(v) => v[row].is_nan(),
            ColumnData::Categorical { codes, categories } => {
                codes[row] < 0 || codes[row] as usize >= categories.len()
            }
        }
    }

    /// Render the value at `row` as text; `None` when missing.
    pub fn text(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Strings(v) => Some(v[row].clone()),
            ColumnData::Numeric(v) => {
                let x = v[row];
                (!x.is_nan()).then(|| x.to_string())
            }
            ColumnData::Categorical { codes, categories } => usize::try_from(codes[row])
                .ok()
                .and_then(|c| categories.get(c))
                .cloned(),
        }
    }

    /// Gather the rows at `positions` into a new column. `None` yields a
    /// missing value.
    pub fn take(&self, positions: &[Option<usize>]) -> ColumnData {
        match self {
            ColumnData::Strings(v) => ColumnData::Strings(
                positions
                    .iter()
                    .map(|p| p.map(|i| v[i].clone()).unwrap_or_default())
                    .collect(),
            ),
            ColumnData::Numeric(v) => ColumnData::Numeric(
                positions
                    .iter()
                    .map(|p| p.map_or(f64::NAN, |i| v[i]))
                    .collect(),
            ),
            ColumnData::Categorical { codes, categories } => ColumnData::Categorical {
                codes: positions.iter().map(|p| p.map_or(-1, |i| codes[i])).collect(),
                categories: categories.clone(),
            },
        }
    }
}

/// A string-indexed, column-major table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index: Vec<String>,
    columns: Vec<(String, ColumnData)>,
}

impl Table {
    /// Create a table with the given row ids and no columns.
    pub fn new(index: Vec<String>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// Builder-style [`Table::add_column`].
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Result<Self> {
        self.add_column(name, data)?;
        Ok(self)
    }

    /// Append a column. Its length must match the index and its name must be new.
    pub fn add_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if data.len() != self.index.len() {
            return Err(LoopyError::InvalidInput(format!(
                "column '{name}' has {} values, expected {}",
                data.len(),
                self.index.len()
            )));
        }
        if self.has_column(&name) {
            return Err(LoopyError::InvalidInput(format!(
                "column '{name}' already exists"
            )));
        }
        self.columns.push((name, data));
        Ok(())
    }

    /// Row ids.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Columns in insertion order.
    pub fn columns(&self) -> &[(String, ColumnData)] {
        &self.columns
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Whether a column named `name` exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// (n_rows, n_cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Ids that occur more than once, each reported once in first-seen order.
    pub fn duplicated_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut dupes = Vec::new();
        for id in &self.index {
            if !seen.insert(id.as_str()) && reported.insert(id.as_str()) {
                dupes.push(id.clone());
            }
        }
        dupes
    }

    /// Map from id to row position. Later duplicates are ignored.
    pub fn positions(&self) -> HashMap<&str, usize> {
        let mut map = HashMap::with_capacity(self.index.len());
        for (i, id) in self.index.iter().enumerate() {
            map.entry(id.as_str()).or_insert(i);
        }
        map
    }

    /// Keep only the first row for each id.
    pub fn remove_dupes(&self) -> Table {
        let mut seen = HashSet::new();
        let (keep, index): (Vec<Option<usize>>, Vec<String>) = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, id)| seen.insert(id.as_str()))
            .map(|(i, id)| (Some(i), id.clone()))
            .unzip();
        self.take(&keep, index)
    }

    /// Build a table whose row `k` is row `positions[k]` of `self` (or all
    /// missing when `None`), with `index` as the new row ids.
    pub fn take(&self, positions: &[Option<usize>], index: Vec<String>) -> Table {
        Table {
            index,
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(positions)))
                .collect(),
        }
    }

    /// A copy of this table without the named columns.
    pub fn drop_columns(&self, names: &[&str]) -> Table {
        Table {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .filter(|(n, _)| !names.contains(&n.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Ids of rows with at least one missing value.
    pub fn rows_with_missing(&self) -> Vec<String> {
        (0..self.n_rows())
            .filter(|&r| self.columns.iter().any(|(_, c)| c.is_missing(r)))
            .map(|r| self.index[r].clone())
            .collect()
    }
}

impl Summarizable for Table {
    fn summary(&self) -> String {
        format!(
            "Table: {} rows \u{00d7} {} columns",
            self.index.len(),
            self.columns.len()
        )
    }
}
