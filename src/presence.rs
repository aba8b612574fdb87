//! Presence and missingness estimation
//!
//! Presence answers "did this window carry a typing (or tapping) signal".
//! An explicit boolean column wins; without one, a numeric proxy column is
//! used instead and a window counts as present when the proxy parses as a number.

use crate::coerce::{is_truthy, parse_numeric};
use crate::config::PresenceRule;
use crate::table::CsvTable;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Source label reported when neither the explicit column nor a proxy exists
pub const NO_PRESENCE_SOURCE: &str = "none";

/// Presence fraction together with the column it was read from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceEstimate {
    pub fraction: f64,
    /// Explicit column name, proxy column name, or `"none"`
    pub source: String,
}

/// Mean of an explicit boolean column; 0.0 for an empty table or absent column
pub fn presence_fraction(table: &CsvTable, column: &str) -> f64 {
    match table.column(column) {
        Some(cells) if !cells.is_empty() => {
            let present = cells.iter().filter(|c| is_truthy(**c)).count();
            present as f64 / cells.len() as f64
        }
        _ => 0.0,
    }
}

/// Per-row presence flags following the rule's fallback order
///
/// Returns the flags and the column they were derived from. Without any
/// usable column every row is absent and the source is `"none"`.
pub fn presence_flags(table: &CsvTable, rule: &PresenceRule) -> (Vec<bool>, String) {
    if let Some(cells) = table.column(&rule.column) {
        let flags = cells.into_iter().map(is_truthy).collect();
        return (flags, rule.column.clone());
    }

    if let Some(proxy) = rule.proxies.resolve(|c| table.has_column(c)) {
        let flags = table
            .column(proxy)
            .unwrap_or_default()
            .into_iter()
            .map(|cell| parse_numeric(cell).is_some())
            .collect();
        return (flags, proxy.to_string());
    }

    (vec![false; table.len()], NO_PRESENCE_SOURCE.to_string())
}

/// Presence fraction with proxy inference
pub fn infer_presence(table: &CsvTable, rule: &PresenceRule) -> PresenceEstimate {
    let (flags, source) = presence_flags(table, rule);
    let fraction = if flags.is_empty() {
        0.0
    } else {
        flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64
    };
    PresenceEstimate { fraction, source }
}

/// Missingness of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnMissingness {
    /// 1 when the column exists in the table, 0 otherwise
    pub present_in_schema: u8,
    /// Fraction of null cells; 1.0 for absent columns and empty tables
    pub missing_frac: f64,
}

impl ColumnMissingness {
    pub fn absent() -> Self {
        Self {
            present_in_schema: 0,
            missing_frac: 1.0,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present_in_schema == 1
    }
}

/// Per-column missingness, in the order the columns were requested
///
/// Serializes as a JSON object keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingnessReport {
    entries: Vec<(String, ColumnMissingness)>,
}

impl MissingnessReport {
    /// Report every column as absent
    pub fn all_absent(columns: &[String]) -> Self {
        Self {
            entries: columns
                .iter()
                .map(|c| (c.clone(), ColumnMissingness::absent()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnMissingness> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnMissingness)> {
        self.entries.iter().map(|(name, m)| (name.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mean missing fraction over the columns present in the schema
    ///
    /// `None` when no requested column is present.
    pub fn mean_present_missing(&self) -> Option<f64> {
        let fracs: Vec<f64> = self
            .entries
            .iter()
            .filter(|(_, m)| m.is_present())
            .map(|(_, m)| m.missing_frac)
            .collect();
        if fracs.is_empty() {
            None
        } else {
            Some(fracs.iter().sum::<f64>() / fracs.len() as f64)
        }
    }
}

impl Serialize for MissingnessReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, missingness) in &self.entries {
            map.serialize_entry(name, missingness)?;
        }
        map.end()
    }
}

/// Missingness of each requested column
pub fn missingness_report(table: &CsvTable, columns: &[String]) -> MissingnessReport {
    let entries = columns
        .iter()
        .map(|name| {
            let missingness = match table.column(name) {
                None => ColumnMissingness::absent(),
                Some(cells) if cells.is_empty() => ColumnMissingness {
                    present_in_schema: 1,
                    missing_frac: 1.0,
                },
                Some(cells) => ColumnMissingness {
                    present_in_schema: 1,
                    missing_frac: cells.iter().filter(|c| c.is_none()).count() as f64
                        / cells.len() as f64,
                },
            };
            (name.clone(), missingness)
        })
        .collect();
    MissingnessReport { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackChain;
    use pretty_assertions::assert_eq;

    fn table(csv: &str) -> CsvTable {
        CsvTable::from_reader(csv.as_bytes()).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_explicit_column_mean_of_tokens() {
        let t = table("has_typing\ntrue\n0\nyes\nbogus\n");
        assert_eq!(presence_fraction(&t, "has_typing"), 0.5);

        let estimate = infer_presence(&t, &PresenceRule::typing());
        assert_eq!(estimate.fraction, 0.5);
        assert_eq!(estimate.source, "has_typing");
    }

    #[test]
    fn test_null_cells_count_as_absent() {
        let t = table("has_tapping,x\n1,a\n,b\n");
        assert_eq!(presence_fraction(&t, "has_tapping"), 0.5);
    }

    #[test]
    fn test_proxy_fallback_uses_first_available_column() {
        let t = table("typing_ikt_within_mean,ikt_mean\n120.5,\n,\n99,1\nabc,2\n");
        let estimate = infer_presence(&t, &PresenceRule::typing());
        assert_eq!(estimate.source, "typing_ikt_within_mean");
        assert_eq!(estimate.fraction, 0.5);
    }

    #[test]
    fn test_no_presence_source() {
        let t = table("other\n1\n2\n");
        let estimate = infer_presence(&t, &PresenceRule::tapping());
        assert_eq!(
            estimate,
            PresenceEstimate {
                fraction: 0.0,
                source: "none".to_string()
            }
        );
    }

    #[test]
    fn test_empty_table_presence_is_zero() {
        let t = table("has_typing\n");
        assert_eq!(infer_presence(&t, &PresenceRule::typing()).fraction, 0.0);
    }

    #[test]
    fn test_custom_proxy_chain() {
        let rule = PresenceRule {
            column: "has_typing".to_string(),
            proxies: FallbackChain::new(&["ikt_mean"]),
        };
        let t = table("typing_ikt_global_mean,ikt_mean\n1,\n2,\n");
        let estimate = infer_presence(&t, &rule);
        assert_eq!(estimate.source, "ikt_mean");
        assert_eq!(estimate.fraction, 0.0);
    }

    #[test]
    fn test_missingness_absent_column_regardless_of_rows() {
        for csv in ["a\n", "a\n1\n", "a\n1\n2\n3\n"] {
            let report = missingness_report(&table(csv), &cols(&["zzz"]));
            assert_eq!(report.get("zzz"), Some(&ColumnMissingness::absent()));
        }
    }

    #[test]
    fn test_missingness_fractions() {
        let t = table("a,b\n1,\n,\n3,x\n,y\n");
        let report = missingness_report(&t, &cols(&["a", "b", "c"]));
        assert_eq!(report.get("a").unwrap().missing_frac, 0.5);
        assert_eq!(report.get("b").unwrap().missing_frac, 0.5);
        assert!(!report.get("c").unwrap().is_present());
        assert_eq!(report.mean_present_missing(), Some(0.5));
    }

    #[test]
    fn test_missingness_serializes_in_request_order() {
        let t = table("b,a\n1,2\n");
        let report = missingness_report(&t, &cols(&["b", "a", "c"]));
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"b":{"present_in_schema":1,"missing_frac":0.0},"a":{"present_in_schema":1,"missing_frac":0.0},"c":{"present_in_schema":0,"missing_frac":1.0}}"#
        );
    }

    #[test]
    fn test_mean_present_missing_none_without_present_columns() {
        let report = MissingnessReport::all_absent(&cols(&["a", "b"]));
        assert_eq!(report.mean_present_missing(), None);
        assert_eq!(report.len(), 2);
    }
}
