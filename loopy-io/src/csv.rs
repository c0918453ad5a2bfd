//! CSV reading and writing for coordinate and feature tables.
//!
//! Tables are written with the row id as the first column. Floats use C's
//! `%.6e` layout (`1.000000e+00`), which existing bundles already carry.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use ::csv::{ReaderBuilder, WriterBuilder};
use loopy_core::{LoopyError, Result};

use crate::table::{ColumnData, Table};

fn csv_err(path: &Path, e: ::csv::Error) -> LoopyError {
    if e.is_io_error() {
        match e.into_kind() {
            ::csv::ErrorKind::Io(io) => LoopyError::io_at(path, io),
            other => LoopyError::Parse(format!("{}: {other:?}", path.display())),
        }
    } else {
        LoopyError::Parse(format!("{}: {e}", path.display()))
    }
}

/// Format a float the way C's `%.6e` does (`1.000000e+00`). `NaN` is empty.
pub fn format_sci(x: f64) -> String {
    if x.is_nan() {
        return String::new();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let s = format!("{x:.6e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

fn cell(col: &ColumnData, row: usize) -> String {
    match col {
        ColumnData::Numeric(v) => format_sci(v[row]),
        other => other.text(row).unwrap_or_default(),
    }
}

/// Write `table` to `writer` with `index_label` as the id column header.
pub fn write_table_to<W: Write>(table: &Table, index_label: &str, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push(index_label.to_string());
    header.extend(table.column_names().into_iter().map(String::from));
    wtr.write_record(&header)
        .map_err(|e| LoopyError::Parse(e.to_string()))?;

    let mut record = Vec::with_capacity(header.len());
    for (row, id) in table.index().iter().enumerate() {
        record.clear();
        record.push(id.clone());
        record.extend(table.columns().iter().map(|(_, c)| cell(c, row)));
        wtr.write_record(&record)
            .map_err(|e| LoopyError::Parse(e.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `table` to a CSV file at `path`, ids under the `index_label` header.
pub fn write_table(table: &Table, index_label: &str, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| LoopyError::io_at(path, e))?;
    write_table_to(table, index_label, std::io::BufWriter::new(file))
}

/// Read a CSV whose first column holds row ids.
///
/// A column whose non-empty cells all parse as floats becomes
/// [`ColumnData::Numeric`] (empty cells are `NaN`); anything else is kept as
/// [`ColumnData::Strings`].
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoopyError::io_at(path, e))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader.headers().map_err(|e| csv_err(path, e))?.clone();
    if headers.is_empty() {
        return Err(LoopyError::Parse(format!(
            "{}: missing header row",
            path.display()
        )));
    }

    let n_cols = headers.len() - 1;
    let mut index = Vec::new();
    let mut raw: Vec<Vec<String>> = vec![Vec::new(); n_cols];
    for result in reader.records() {
        let record = result.map_err(|e| csv_err(path, e))?;
        index.push(record.get(0).unwrap_or_default().to_string());
        for (c, col) in raw.iter_mut().enumerate() {
            col.push(record.get(c + 1).unwrap_or_default().to_string());
        }
    }

    let mut table = Table::new(index);
    for (name, values) in headers.iter().skip(1).zip(raw) {
        table.add_column(name, infer_column(values))?;
    }
    Ok(table)
}

fn infer_column(values: Vec<String>) -> ColumnData {
    let parsed: Option<Vec<f64>> = values
        .iter()
        .map(|v| {
            if v.is_empty() {
                Some(f64::NAN)
            } else {
                v.parse::<f64>().ok()
            }
        })
        .collect();
    match parsed {
        Some(nums) => ColumnData::Numeric(nums),
        None => ColumnData::Strings(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_sci() {
        assert_eq!(format_sci(1.0), "1.000000e+00");
        assert_eq!(format_sci(0.0), "0.000000e+00");
        assert_eq!(format_sci(1234.5), "1.234500e+03");
        assert_eq!(format_sci(-0.00001), "-1.000000e-05");
        assert_eq!(format_sci(f64::NAN), "");
    }

    #[test]
    fn test_write_then_read_table() {
        let table = Table::new(vec!["a".into(), "b".into()])
            .with_column("x", ColumnData::Numeric(vec![0.0, 1.0]))
            .unwrap()
            .with_column(
                "label",
                ColumnData::Strings(vec!["tumor".into(), "stroma".into()]),
            )
            .unwrap();

        let file = NamedTempFile::with_suffix(".csv").unwrap();
        write_table(&table, "id", file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(
            text,
            "id,x,label\na,0.000000e+00,tumor\nb,1.000000e+00,stroma\n"
        );

        let back = read_table(file.path()).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_read_table_empty_cells_are_nan() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "id,gene").unwrap();
        writeln!(file, "a,").unwrap();
        writeln!(file, "b,2.5").unwrap();
        file.flush().unwrap();

        let table = read_table(file.path()).unwrap();
        let gene = table.column("gene").unwrap().as_numeric().unwrap();
        assert!(gene[0].is_nan());
        assert_eq!(gene[1], 2.5);
    }

    #[test]
    fn test_csv_file_not_found() {
        let err = read_table("/nonexistent/file.csv").unwrap_err();
        assert!(matches!(err, LoopyError::Io(_)), "{err}");
    }
}
