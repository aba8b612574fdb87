//! In-memory CSV tables
//!
//! Session exports are small, so each file is loaded whole into a
//! [`CsvTable`]: the header row plus nullable text cells. Typing happens
//! later, column by column, through [`crate::coerce`].

use crate::coerce::{is_null_token, parse_numeric};
use crate::error::QcError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A loaded CSV file: ordered headers and rows of nullable text cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl CsvTable {
    /// Create a table from headers and rows; short rows are padded with nulls
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Load a table from a CSV file on disk
    pub fn from_path(path: &Path) -> Result<Self, QcError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a table from any CSV reader
    ///
    /// Rows with fewer fields than the header are padded with nulls; cells
    /// matching a null token (empty, `NaN`, `NA`, ...) are stored as `None`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, QcError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .take(headers.len())
                .map(|cell| {
                    if is_null_token(cell) {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        Ok(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of a column in file order, or `None` if the column is absent
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_deref()).collect())
    }

    /// Numeric view of a column; unparseable cells are `None`
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name)
            .map(|cells| cells.into_iter().map(parse_numeric).collect())
    }

    /// Cell at a row and column
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Replace a column's values, appending the column if absent
    ///
    /// `values` must hold one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<String>>) -> Result<(), QcError> {
        if values.len() != self.rows.len() {
            return Err(QcError::DatasetError(format!(
                "column {} has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.headers.len() - 1
            }
        };

        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    /// Fill nulls in a column, adding the column if absent
    pub fn fill_nulls(&mut self, name: &str, value: &str) {
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.headers.len() - 1
            }
        };

        for row in &mut self.rows {
            if row[idx].is_none() {
                row[idx] = Some(value.to_string());
            }
        }
    }

    /// Concatenate tables row-wise
    ///
    /// Columns are the union of all headers in order of first appearance;
    /// cells for columns a table lacks are null.
    pub fn concat(tables: Vec<CsvTable>) -> CsvTable {
        let mut headers: Vec<String> = Vec::new();
        for table in &tables {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let mapping: Vec<Option<usize>> = headers
                .iter()
                .map(|h| table.column_index(h))
                .collect();
            for row in table.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.and_then(|i| row[i].clone()))
                        .collect(),
                );
            }
        }

        CsvTable { headers, rows }
    }
}
