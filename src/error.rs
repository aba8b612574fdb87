//! Error types for biometrics-qc

use thiserror::Error;

/// Errors that abort a run
///
/// Soft findings (validator issues, gate reasons) are never errors; they are
/// collected into reports instead.
#[derive(Debug, Error)]
pub enum QcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{session}: missing required schema columns: {columns:?}")]
    MissingSchemaColumns {
        session: String,
        columns: Vec<String>,
    },

    #[error("{session}: schemaVersion must be {required}")]
    SchemaVersionMismatch { session: String, required: i64 },

    #[error("No windows built (no auth_windows.csv found)")]
    NoWindows,

    #[error("Columnar writer unavailable: {0}")]
    ColumnarUnavailable(String),

    #[error("No output written: columnar writer unavailable and no fallback format requested")]
    NoOutputWritten,

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "parquet")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}
