//! Aggregated window dataset
//!
//! Session window tables are projected onto a typed column set and merged
//! into one [`WindowDataset`], sorted by participant, session and window.
//!
//! Pipeline: auth_windows.csv → schema check → backfill → presence → slopes
//! → projection → concatenation → stable sort → Parquet/CSV

pub mod builder;
pub mod writer;

pub use builder::{build_session, SessionFrame};
pub use writer::{read_parquet, write_csv, write_parquet};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Logical type of a dataset column; every type is nullable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
}

impl ColumnType {
    /// Common type of two columns merged by concatenation
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Int, ColumnType::Float) | (ColumnType::Float, ColumnType::Int) => {
                ColumnType::Float
            }
            _ => ColumnType::Text,
        }
    }
}

/// One typed, nullable cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert the cell to another column type
    pub fn cast(self, dtype: ColumnType) -> CellValue {
        match (self, dtype) {
            (CellValue::Null, _) => CellValue::Null,
            (CellValue::Int(v), ColumnType::Float) => CellValue::Float(v as f64),
            (CellValue::Float(v), ColumnType::Int) if v.fract() == 0.0 => CellValue::Int(v as i64),
            (CellValue::Float(_), ColumnType::Int) => CellValue::Null,
            (CellValue::Text(s), ColumnType::Text) => CellValue::Text(s),
            (value, ColumnType::Text) => CellValue::Text(value.to_string()),
            (value, _) => value,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            CellValue::Bool(_) => 0,
            CellValue::Int(_) | CellValue::Float(_) => 1,
            CellValue::Text(_) => 2,
            CellValue::Null => 3,
        }
    }

    /// Total order used for sorting: values ascending, nulls last
    pub fn sort_cmp(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Int(_) | CellValue::Float(_), CellValue::Int(_) | CellValue::Float(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    /// CSV rendering; nulls are empty and integral floats keep `.0`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{:?}", v),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Column definition of the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetColumn {
    pub name: String,
    pub dtype: ColumnType,
}

impl DatasetColumn {
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Row-major typed table of aggregated windows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowDataset {
    columns: Vec<DatasetColumn>,
    rows: Vec<Vec<CellValue>>,
}

impl WindowDataset {
    /// Build a dataset; every row must have one cell per column
    pub fn new(columns: Vec<DatasetColumn>, rows: Vec<Vec<CellValue>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[DatasetColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cells of one column in row order
    pub fn column_values(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Concatenate datasets row-wise
    ///
    /// Columns are unioned in order of first appearance and their types
    /// widened; cells of columns a part lacks are null.
    pub fn concat(parts: Vec<WindowDataset>) -> WindowDataset {
        let mut columns: Vec<DatasetColumn> = Vec::new();
        for part in &parts {
            for column in &part.columns {
                match columns.iter_mut().find(|c| c.name == column.name) {
                    Some(existing) => existing.dtype = existing.dtype.widen(column.dtype),
                    None => columns.push(column.clone()),
                }
            }
        }

        let mut rows = Vec::new();
        for part in parts {
            let mapping: Vec<Option<usize>> = columns
                .iter()
                .map(|c| part.column_index(&c.name))
                .collect();
            for row in part.rows {
                let mut row: Vec<Option<CellValue>> = row.into_iter().map(Some).collect();
                rows.push(
                    mapping
                        .iter()
                        .zip(&columns)
                        .map(|(idx, column)| match idx {
                            Some(i) => row[*i]
                                .take()
                                .unwrap_or(CellValue::Null)
                                .cast(column.dtype),
                            None => CellValue::Null,
                        })
                        .collect(),
                );
            }
        }

        WindowDataset { columns, rows }
    }

    /// Stable sort by the given columns (those absent are skipped)
    pub fn sort_by_columns(&mut self, keys: &[&str]) {
        let indices: Vec<usize> = keys.iter().filter_map(|k| self.column_index(k)).collect();
        if indices.is_empty() {
            return;
        }
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].sort_cmp(&b[i]))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
}
