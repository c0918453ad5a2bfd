//! Aligning feature tables against registered coordinates.
//!
//! The coordinate table is the template: the output has exactly its rows, in
//! its order, carrying the feature table's columns. `x` and `y` belong to the
//! coordinates and never reach the output.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use loopy_core::{LoopyError, Result};
use loopy_io::{ColumnData, Table};

/// Columns reserved for coordinates.
pub const RESERVED_COLUMNS: [&str; 2] = ["x", "y"];

/// Ids listed in one error message before the rest are summarized.
const MAX_LISTED: usize = 20;

/// What to do with coordinate entities that have no feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Fail, listing the entities without values.
    #[default]
    Reject,
    /// Fill numeric gaps with -1 and text gaps with an empty string.
    Fill,
}

/// Join options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinConfig {
    pub missing: MissingPolicy,
}

fn list_ids(ids: &[String]) -> String {
    let shown = ids
        .iter()
        .take(MAX_LISTED)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > MAX_LISTED {
        format!("{shown} (and {} more)", ids.len() - MAX_LISTED)
    } else {
        shown
    }
}

fn check_unique(table: &Table, what: &str) -> Result<()> {
    let dupes = table.duplicated_ids();
    if dupes.is_empty() {
        return Ok(());
    }
    Err(LoopyError::InvalidInput(format!(
        "{what} index has duplicated ids: {}",
        list_ids(&dupes)
    )))
}

/// Check a coordinate table: unique ids and non-null numeric `x`, `y`.
pub fn validate_coords(table: &Table, name: &str) -> Result<()> {
    check_unique(table, &format!("coordinates '{name}'"))?;
    for axis in RESERVED_COLUMNS {
        match table.column(axis) {
            Some(ColumnData::Numeric(_)) => {}
            Some(_) => {
                return Err(LoopyError::InvalidInput(format!(
                    "coordinates '{name}': column '{axis}' must be numeric"
                )))
            }
            None => {
                return Err(LoopyError::InvalidInput(format!(
                    "coordinates '{name}' must have 'x' and 'y' columns, found [{}]",
                    table.column_names().join(", ")
                )))
            }
        }
    }
    let xy = Table::new(table.index().to_vec());
    let xy = RESERVED_COLUMNS.iter().try_fold(xy, |t, axis| match table.column(axis) {
        Some(c) => t.with_column(*axis, c.clone()),
        None => Ok(t),
    })?;
    let nulls = xy.rows_with_missing();
    if !nulls.is_empty() {
        return Err(LoopyError::InvalidInput(format!(
            "coordinates '{name}': x and y must not be null, missing for ids: {}",
            list_ids(&nulls)
        )));
    }
    Ok(())
}

/// Check a feature table: unique ids and no reserved column names.
pub fn validate_features(table: &Table, name: &str) -> Result<()> {
    check_unique(table, &format!("feature '{name}'"))?;
    let reserved: Vec<&str> = table
        .column_names()
        .into_iter()
        .filter(|c| RESERVED_COLUMNS.contains(c))
        .collect();
    if !reserved.is_empty() {
        return Err(LoopyError::InvalidInput(format!(
            "feature '{name}' must not have columns named x or y, found [{}]",
            reserved.join(", ")
        )));
    }
    Ok(())
}

fn fill_missing(table: Table) -> Result<Table> {
    let mut out = Table::new(table.index().to_vec());
    for (name, column) in table.columns() {
        let filled = match column {
            ColumnData::Numeric(v) => ColumnData::Numeric(
                v.iter()
                    .map(|&x| if x.is_nan() { -1.0 } else { x })
                    .collect(),
            ),
            ColumnData::Categorical { .. } => ColumnData::Strings(
                (0..column.len())
                    .map(|r| column.text(r).unwrap_or_default())
                    .collect(),
            ),
            other => other.clone(),
        };
        out.add_column(name.clone(), filled)?;
    }
    Ok(out)
}

/// Left-join `features` onto the ids of `coords`.
///
/// Both tables are validated first. The result has one row per coordinate
/// entity, in coordinate order, with the feature columns only.
pub fn join(coords: &Table, features: &Table, name: &str, config: &JoinConfig) -> Result<Table> {
    check_unique(coords, "coordinates")?;
    validate_features(features, name)?;

    let lookup = features.positions();
    let positions: Vec<Option<usize>> = coords
        .index()
        .iter()
        .map(|id| lookup.get(id.as_str()).copied())
        .collect();
    let joined = features.take(&positions, coords.index().to_vec());

    let joined = match config.missing {
        MissingPolicy::Reject => {
            // Unmatched ids count even when every feature column is text.
            let with_nulls: HashSet<String> = joined.rows_with_missing().into_iter().collect();
            let missing: Vec<String> = coords
                .index()
                .iter()
                .zip(&positions)
                .filter(|(id, p)| p.is_none() || with_nulls.contains(*id))
                .map(|(id, _)| id.clone())
                .collect();
            if !missing.is_empty() {
                return Err(LoopyError::Consistency(format!(
                    "feature '{name}' has missing values after joining with coordinates for {} ids: {}",
                    missing.len(),
                    list_ids(&missing)
                )));
            }
            joined
        }
        MissingPolicy::Fill => fill_missing(joined)?,
    };

    if joined.n_rows() != coords.n_rows() {
        return Err(LoopyError::Consistency(format!(
            "feature '{name}' joined to {} rows, expected {}",
            joined.n_rows(),
            coords.n_rows()
        )));
    }
    Ok(joined)
}
