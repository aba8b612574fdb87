//! Dataset writers
//!
//! Parquet output needs the `parquet` feature; CSV is always available.

use crate::dataset::WindowDataset;
use crate::error::QcError;
use std::path::Path;

/// Write the dataset as CSV; nulls become empty cells
pub fn write_csv(dataset: &WindowDataset, path: &Path) -> Result<(), QcError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(dataset.column_names())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "parquet")]
mod columnar {
    use crate::dataset::{CellValue, ColumnType, DatasetColumn, WindowDataset};
    use crate::error::QcError;
    use arrow_array::{
        Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    };
    use arrow_schema::{DataType, Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::arrow::ArrowWriter;
    use std::fs::File;
    use std::path::Path;
    use std::sync::Arc;

    fn arrow_type(dtype: ColumnType) -> DataType {
        match dtype {
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Int => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Text => DataType::Utf8,
        }
    }

    fn column_type(data_type: &DataType) -> Result<ColumnType, QcError> {
        match data_type {
            DataType::Boolean => Ok(ColumnType::Bool),
            DataType::Int64 => Ok(ColumnType::Int),
            DataType::Float64 => Ok(ColumnType::Float),
            DataType::Utf8 => Ok(ColumnType::Text),
            other => Err(QcError::DatasetError(format!(
                "unsupported column type {}",
                other
            ))),
        }
    }

    fn build_array(dataset: &WindowDataset, idx: usize, dtype: ColumnType) -> ArrayRef {
        let cells = dataset.rows().iter().map(|row| row[idx].clone().cast(dtype));
        match dtype {
            ColumnType::Bool => Arc::new(BooleanArray::from(
                cells
                    .map(|c| match c {
                        CellValue::Bool(v) => Some(v),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnType::Int => Arc::new(Int64Array::from(
                cells
                    .map(|c| match c {
                        CellValue::Int(v) => Some(v),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnType::Float => Arc::new(Float64Array::from(
                cells.map(|c| c.as_f64()).collect::<Vec<_>>(),
            )),
            ColumnType::Text => Arc::new(StringArray::from(
                cells
                    .map(|c| match c {
                        CellValue::Text(s) => Some(s),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        }
    }

    pub fn write_parquet(dataset: &WindowDataset, path: &Path) -> Result<(), QcError> {
        let fields: Vec<Field> = dataset
            .columns()
            .iter()
            .map(|c| Field::new(c.name.as_str(), arrow_type(c.dtype), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<ArrayRef> = dataset
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, c)| build_array(dataset, idx, c.dtype))
            .collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    fn cell_at(array: &ArrayRef, dtype: ColumnType, row: usize) -> CellValue {
        if array.is_null(row) {
            return CellValue::Null;
        }
        let any = array.as_any();
        let value = match dtype {
            ColumnType::Bool => any
                .downcast_ref::<BooleanArray>()
                .map(|a| CellValue::Bool(a.value(row))),
            ColumnType::Int => any
                .downcast_ref::<Int64Array>()
                .map(|a| CellValue::Int(a.value(row))),
            ColumnType::Float => any
                .downcast_ref::<Float64Array>()
                .map(|a| CellValue::Float(a.value(row))),
            ColumnType::Text => any
                .downcast_ref::<StringArray>()
                .map(|a| CellValue::Text(a.value(row).to_string())),
        };
        value.unwrap_or(CellValue::Null)
    }

    pub fn read_parquet(path: &Path) -> Result<WindowDataset, QcError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let columns = builder
            .schema()
            .fields()
            .iter()
            .map(|f| Ok(DatasetColumn::new(f.name().clone(), column_type(f.data_type())?)))
            .collect::<Result<Vec<_>, QcError>>()?;

        let mut rows = Vec::new();
        for batch in builder.build()? {
            let batch = batch?;
            for row in 0..batch.num_rows() {
                rows.push(
                    columns
                        .iter()
                        .enumerate()
                        .map(|(idx, c)| cell_at(batch.column(idx), c.dtype, row))
                        .collect(),
                );
            }
        }

        Ok(WindowDataset::new(columns, rows))
    }
}

/// Write the dataset as Parquet
#[cfg(feature = "parquet")]
pub fn write_parquet(dataset: &WindowDataset, path: &Path) -> Result<(), QcError> {
    columnar::write_parquet(dataset, path)
}

/// Parquet support was compiled out
#[cfg(not(feature = "parquet"))]
pub fn write_parquet(_dataset: &WindowDataset, _path: &Path) -> Result<(), QcError> {
    Err(QcError::ColumnarUnavailable(
        "built without the `parquet` feature".to_string(),
    ))
}

/// Read a dataset written by [`write_parquet`]
#[cfg(feature = "parquet")]
pub fn read_parquet(path: &Path) -> Result<WindowDataset, QcError> {
    columnar::read_parquet(path)
}

#[cfg(not(feature = "parquet"))]
pub fn read_parquet(_path: &Path) -> Result<WindowDataset, QcError> {
    Err(QcError::ColumnarUnavailable(
        "built without the `parquet` feature".to_string(),
    ))
}
