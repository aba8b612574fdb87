//! Column and type checks shared by the validator and the dataset builder

use crate::coerce::parse_numeric;
use crate::error::QcError;
use crate::table::CsvTable;

/// Required columns absent from the table, in the order they were required
pub fn missing_columns(table: &CsvTable, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|c| !table.has_column(c))
        .cloned()
        .collect()
}

/// Whether every `schemaVersion` value is numeric and equals `required`
///
/// An absent column does not match.
pub fn schema_version_matches(table: &CsvTable, required: i64) -> bool {
    match table.column("schemaVersion") {
        Some(cells) => cells
            .into_iter()
            .all(|cell| parse_numeric(cell) == Some(required as f64)),
        None => false,
    }
}

/// Fail-fast schema check of a window table
///
/// Returns the first violation as a hard error: missing required columns
/// take precedence over a schema version mismatch.
pub fn ensure_window_schema(
    table: &CsvTable,
    session_id: &str,
    required_columns: &[String],
    required_version: i64,
) -> Result<(), QcError> {
    let missing = missing_columns(table, required_columns);
    if !missing.is_empty() {
        return Err(QcError::MissingSchemaColumns {
            session: session_id.to_string(),
            columns: missing,
        });
    }

    if !schema_version_matches(table, required_version) {
        return Err(QcError::SchemaVersionMismatch {
            session: session_id.to_string(),
            required: required_version,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> CsvTable {
        CsvTable::from_reader(csv.as_bytes()).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_missing_columns_keeps_required_order() {
        let t = table("b,schemaVersion\n1,2\n");
        assert_eq!(
            missing_columns(&t, &cols(&["z", "b", "a"])),
            cols(&["z", "a"])
        );
    }

    #[test]
    fn test_schema_version_matches() {
        assert!(schema_version_matches(&table("schemaVersion\n2\n2.0\n"), 2));
        assert!(!schema_version_matches(&table("schemaVersion\n2\n3\n"), 2));
        assert!(!schema_version_matches(&table("schemaVersion\n2\nabc\n"), 2));
        assert!(!schema_version_matches(&table("schemaVersion\n2\n\n"), 2));
        assert!(!schema_version_matches(&table("other\n2\n"), 2));
    }

    #[test]
    fn test_ensure_window_schema_missing_columns() {
        let t = table("schemaVersion\n2\n");
        let err = ensure_window_schema(&t, "s1", &cols(&["schemaVersion", "has_typing"]), 2)
            .unwrap_err();
        match err {
            QcError::MissingSchemaColumns { session, columns } => {
                assert_eq!(session, "s1");
                assert_eq!(columns, cols(&["has_typing"]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ensure_window_schema_version() {
        let t = table("schemaVersion\n1\n");
        let err = ensure_window_schema(&t, "s1", &cols(&["schemaVersion"]), 2).unwrap_err();
        assert_eq!(err.to_string(), "s1: schemaVersion must be 2");

        let ok = table("schemaVersion\n2\n");
        assert!(ensure_window_schema(&ok, "s1", &cols(&["schemaVersion"]), 2).is_ok());
    }
}
