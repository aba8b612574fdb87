//! Per-session dataset builder
//!
//! Unlike the validator, the builder refuses malformed input: a window table
//! missing required columns or carrying the wrong schema version aborts the
//! whole build.

use crate::coerce::{parse_integral, parse_numeric};
use crate::config::{DatasetConfig, ID_COLUMNS, TAPPING_SLOPE_COLUMN, TYPING_SLOPE_COLUMN};
use crate::dataset::{CellValue, ColumnType, DatasetColumn, WindowDataset};
use crate::error::QcError;
use crate::presence::presence_flags;
use crate::schema::ensure_window_schema;
use crate::session::SessionDir;
use crate::slope::{session_slopes, SessionSlopes};
use crate::table::CsvTable;
use tracing::debug;

/// Projected windows of one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFrame {
    pub session_id: String,
    pub slopes: SessionSlopes,
    pub windows: WindowDataset,
}

/// How a projected column is filled
enum ColumnSource {
    Text(String),
    Integer(String),
    Inferred(String, ColumnType),
    Flags(Vec<bool>),
    Broadcast(Option<f64>),
}

/// Build the projected windows of a session directory
///
/// Returns `Ok(None)` when the session has no window table.
pub fn build_session(session: &SessionDir, config: &DatasetConfig) -> Result<Option<SessionFrame>, QcError> {
    let Some(table) = session.load_table(&config.auth_windows_file)? else {
        debug!(session = %session.session_id, "no window table, skipping");
        return Ok(None);
    };
    project_session(&session.session_id, table, config).map(Some)
}

/// Project a loaded window table onto the dataset columns
pub fn project_session(
    session_id: &str,
    mut table: CsvTable,
    config: &DatasetConfig,
) -> Result<SessionFrame, QcError> {
    ensure_window_schema(
        &table,
        session_id,
        &config.columns.dataset_required,
        config.required_schema_version,
    )?;

    table.fill_nulls("sessionId", session_id);
    if !table.has_column("windowIndex") {
        let sequence = (0..table.len()).map(|i| Some(i.to_string())).collect();
        table.set_column("windowIndex", sequence)?;
    }
    if !table.has_column("participantId") {
        table.set_column("participantId", vec![None; table.len()])?;
    }

    let (typing_flags, _) = presence_flags(&table, &config.typing_presence);
    let (tapping_flags, _) = presence_flags(&table, &config.tapping_presence);
    let slopes = session_slopes(&table, &config.slopes);

    let mut plan: Vec<(String, ColumnSource)> = Vec::new();
    for id in ID_COLUMNS {
        if table.has_column(id) {
            plan.push((id.to_string(), source_for(&table, id, config)));
        }
    }
    plan.push((config.typing_presence.column.clone(), ColumnSource::Flags(typing_flags)));
    plan.push((config.tapping_presence.column.clone(), ColumnSource::Flags(tapping_flags)));

    for feature in &config.features {
        let taken = plan.iter().any(|(name, _)| name == feature);
        let derived = feature == TYPING_SLOPE_COLUMN || feature == TAPPING_SLOPE_COLUMN;
        if table.has_column(feature) && !taken && !derived {
            plan.push((feature.clone(), source_for(&table, feature, config)));
        }
    }

    plan.push((TYPING_SLOPE_COLUMN.to_string(), ColumnSource::Broadcast(slopes.typing)));
    plan.push((TAPPING_SLOPE_COLUMN.to_string(), ColumnSource::Broadcast(slopes.tapping)));

    let windows = materialize(&table, plan);
    debug!(
        session = %session_id,
        rows = windows.len(),
        typing_slope = ?slopes.typing,
        tapping_slope = ?slopes.tapping,
        "session projected"
    );

    Ok(SessionFrame {
        session_id: session_id.to_string(),
        slopes,
        windows,
    })
}

fn source_for(table: &CsvTable, column: &str, config: &DatasetConfig) -> ColumnSource {
    if column == "participantId" || column == "sessionId" {
        ColumnSource::Text(column.to_string())
    } else if config.columns.integer_columns.iter().any(|c| c == column) {
        ColumnSource::Integer(column.to_string())
    } else {
        let cells = table.column(column).unwrap_or_default();
        ColumnSource::Inferred(column.to_string(), infer_column_type(&cells))
    }
}

/// Infer the type of a free-form feature column from its non-null cells
///
/// All-null columns are floats, matching a column of missing measurements.
pub fn infer_column_type(cells: &[Option<&str>]) -> ColumnType {
    let values: Vec<&str> = cells.iter().flatten().map(|c| c.trim()).collect();
    if values.is_empty() {
        ColumnType::Float
    } else if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        ColumnType::Int
    } else if values.iter().all(|v| parse_numeric(Some(*v)).is_some()) {
        ColumnType::Float
    } else if values
        .iter()
        .all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false"))
    {
        ColumnType::Bool
    } else {
        ColumnType::Text
    }
}

fn typed_cell(raw: Option<&str>, dtype: ColumnType) -> CellValue {
    let Some(raw) = raw else {
        return CellValue::Null;
    };
    let value = match dtype {
        ColumnType::Int => parse_integral(Some(raw)).map(CellValue::Int),
        ColumnType::Float => parse_numeric(Some(raw)).map(CellValue::Float),
        ColumnType::Bool => Some(CellValue::Bool(raw.trim().eq_ignore_ascii_case("true"))),
        ColumnType::Text => Some(CellValue::Text(raw.to_string())),
    };
    value.unwrap_or(CellValue::Null)
}

fn materialize(table: &CsvTable, plan: Vec<(String, ColumnSource)>) -> WindowDataset {
    let n = table.len();
    let mut columns = Vec::with_capacity(plan.len());
    let mut cells_by_column: Vec<Vec<CellValue>> = Vec::with_capacity(plan.len());

    for (name, source) in plan {
        let (dtype, cells) = match source {
            ColumnSource::Text(col) => (ColumnType::Text, typed(table, &col, ColumnType::Text)),
            ColumnSource::Integer(col) => (ColumnType::Int, typed(table, &col, ColumnType::Int)),
            ColumnSource::Inferred(col, dtype) => (dtype, typed(table, &col, dtype)),
            ColumnSource::Flags(flags) => (
                ColumnType::Bool,
                flags.into_iter().map(CellValue::Bool).collect(),
            ),
            ColumnSource::Broadcast(value) => {
                let cell = value.map(CellValue::Float).unwrap_or(CellValue::Null);
                (ColumnType::Float, vec![cell; n])
            }
        };
        columns.push(DatasetColumn::new(name, dtype));
        cells_by_column.push(cells);
    }

    let mut iters: Vec<_> = cells_by_column.into_iter().map(Vec::into_iter).collect();
    let rows = (0..n)
        .map(|_| {
            iters
                .iter_mut()
                .map(|it| it.next().unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    WindowDataset::new(columns, rows)
}

fn typed(table: &CsvTable, column: &str, dtype: ColumnType) -> Vec<CellValue> {
    table
        .column(column)
        .unwrap_or_else(|| vec![None; table.len()])
        .into_iter()
        .map(|cell| typed_cell(cell, dtype))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "schemaVersion,participantId,sessionId,windowIndex,user_id,session_order,session_date,device_family,window_duration_ms,n_key_events,n_tap_hits,n_tap_misses,is_low_activity_window,has_typing,has_tapping,typing_ikt_global_mean,tap_rt_mean";

    fn table(csv: &str) -> CsvTable {
        CsvTable::from_reader(csv.as_bytes()).unwrap()
    }

    fn session_csv(rows: &[&str]) -> String {
        let mut lines = vec![HEADER.to_string()];
        lines.extend(rows.iter().map(|r| r.to_string()));
        lines.join("\n") + "\n"
    }

    #[test]
    fn test_projection_column_order_and_types() {
        let csv = session_csv(&[
            "2,p1,s1,0,u1,1,2024-01-15,ios,30000,10,3,0,false,1,yes,100,400",
            "2,p1,s1,1,u1,1,2024-01-15,ios,30000,12,4,1,true,0,no,110,390",
        ]);
        let config = DatasetConfig {
            features: vec![
                "tap_rt_mean".to_string(),
                "n_key_events".to_string(),
                "has_typing".to_string(),
                "not_in_table".to_string(),
                "tap_rt_mean".to_string(),
            ],
            ..DatasetConfig::default()
        };

        let frame = project_session("s1", table(&csv), &config).unwrap();
        let ds = &frame.windows;
        assert_eq!(
            ds.column_names(),
            vec![
                "participantId",
                "sessionId",
                "windowIndex",
                "has_typing",
                "has_tapping",
                "tap_rt_mean",
                "n_key_events",
                "typing_fatigue_slope",
                "tapping_fatigue_slope",
            ]
        );
        assert_eq!(
            ds.rows()[0],
            vec![
                CellValue::Text("p1".into()),
                CellValue::Text("s1".into()),
                CellValue::Int(0),
                CellValue::Bool(true),
                CellValue::Bool(true),
                CellValue::Int(400),
                CellValue::Int(10),
                CellValue::Float(10.0),
                CellValue::Float(-10.0),
            ]
        );
        assert_eq!(ds.rows()[1][3], CellValue::Bool(false));
        assert_eq!(frame.slopes.typing, Some(10.0));
    }

    #[test]
    fn test_missing_required_column_is_hard_error() {
        let csv = "schemaVersion,windowIndex\n2,0\n";
        let err = project_session("s1", table(csv), &DatasetConfig::default()).unwrap_err();
        assert!(matches!(err, QcError::MissingSchemaColumns { .. }));
        assert!(err.to_string().starts_with("s1: missing required schema columns"));
    }

    #[test]
    fn test_wrong_schema_version_is_hard_error() {
        let csv = session_csv(&["1,p1,s1,0,u1,1,2024-01-15,ios,30000,10,3,0,false,1,1,100,400"]);
        let err = project_session("s1", table(&csv), &DatasetConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "s1: schemaVersion must be 2");
    }

    #[test]
    fn test_backfills_identifiers() {
        let csv = "schemaVersion,user_id,session_order,session_date,device_family,window_duration_ms,n_key_events,n_tap_hits,n_tap_misses,is_low_activity_window,has_typing,has_tapping\n\
                   2,u1,1,2024-01-15,ios,30000,1,1,0,0,1,1\n\
                   2,u1,1,2024-01-15,ios,30000,1,1,0,0,1,1\n";
        let frame = project_session("folder", table(csv), &DatasetConfig::default()).unwrap();
        let ds = frame.windows;

        assert_eq!(
            ds.column_values("sessionId").unwrap(),
            vec![&CellValue::Text("folder".into()), &CellValue::Text("folder".into())]
        );
        assert_eq!(
            ds.column_values("windowIndex").unwrap(),
            vec![&CellValue::Int(0), &CellValue::Int(1)]
        );
        assert_eq!(
            ds.column_values("participantId").unwrap(),
            vec![&CellValue::Null, &CellValue::Null]
        );
        assert_eq!(frame.slopes, SessionSlopes::default());
    }

    #[test]
    fn test_integer_coercion_nulls_bad_values() {
        let csv = session_csv(&[
            "2,p1,s1,0,u1,1,2024-01-15,ios,30000,abc,3.5,,false,1,1,100,400",
        ]);
        let frame = project_session("s1", table(&csv), &DatasetConfig::default()).unwrap();
        let ds = frame.windows;
        assert_eq!(ds.column_values("n_key_events").unwrap(), vec![&CellValue::Null]);
        assert_eq!(ds.column_values("n_tap_hits").unwrap(), vec![&CellValue::Null]);
        assert_eq!(ds.column_values("n_tap_misses").unwrap(), vec![&CellValue::Null]);
        assert_eq!(
            ds.column_values("window_duration_ms").unwrap(),
            vec![&CellValue::Int(30000)]
        );
    }

    #[test]
    fn test_infer_column_type() {
        assert_eq!(infer_column_type(&[Some("1"), None, Some("2")]), ColumnType::Int);
        assert_eq!(infer_column_type(&[Some("1"), Some("2.5")]), ColumnType::Float);
        assert_eq!(infer_column_type(&[Some("True"), Some("false")]), ColumnType::Bool);
        assert_eq!(infer_column_type(&[Some("ios"), Some("1")]), ColumnType::Text);
        assert_eq!(infer_column_type(&[None, None]), ColumnType::Float);
    }

    #[test]
    fn test_build_session_without_window_table() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("s1");
        fs::create_dir(&dir).unwrap();
        let built = build_session(&SessionDir::new(&dir), &DatasetConfig::default()).unwrap();
        assert!(built.is_none());
    }
}
