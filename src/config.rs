//! Run configuration
//!
//! Column sets, fallback chains and thresholds are plain values passed into
//! each stage. Defaults reproduce the layout of the v2 session export.

use serde::{Deserialize, Serialize};

/// Default required schema version of session exports
pub const DEFAULT_SCHEMA_VERSION: i64 = 2;

/// Default name of the windowed feature table in a session directory
pub const AUTH_WINDOWS_FILE: &str = "auth_windows.csv";

/// Default name of the raw event table in a session directory
pub const EVENTS_FILE: &str = "events.csv";

/// Identifier columns, in output order
pub const ID_COLUMNS: [&str; 3] = ["participantId", "sessionId", "windowIndex"];

/// Derived per-session slope columns
pub const TYPING_SLOPE_COLUMN: &str = "typing_fatigue_slope";
pub const TAPPING_SLOPE_COLUMN: &str = "tapping_fatigue_slope";

/// Default feature columns kept in the aggregated dataset
pub const DEFAULT_FEATURES: &[&str] = &[
    "schemaVersion",
    "user_id",
    "session_order",
    "session_date",
    "device_family",
    "window_duration_ms",
    "n_key_events",
    "n_tap_hits",
    "n_tap_misses",
    "is_low_activity_window",
    "typing_ikt_global_mean",
    "typing_ikt_global_std",
    "typing_ikt_within_mean",
    "typing_ikt_within_std",
    "tap_rt_mean",
    "tap_rt_std",
    "typing_drift_ikt",
    "tap_drift_rt",
    "tap_miss_rate_pct",
    "coupling_var_ikt",
    "coupling_var_rt",
    "coupling_var_ratio",
];

/// Default core features whose missingness gates a QC run
pub const DEFAULT_CORE_FEATURES: &[&str] = &[
    "participantId",
    "sessionId",
    "windowIndex",
    "typing_ikt_global_mean",
    "typing_ikt_global_std",
    "tap_rt_mean",
    "tap_rt_std",
    "typing_drift_ikt",
    "tap_drift_rt",
];

const AUTH_REQUIRED: &[&str] = &[
    "schemaVersion",
    "sessionId",
    "participantId",
    "user_id",
    "session_order",
    "session_date",
    "device_family",
    "windowIndex",
    "windowStartMs",
    "windowEndMs",
    "window_duration_ms",
    "n_key_events",
    "n_tap_hits",
    "n_tap_misses",
    "is_low_activity_window",
    "has_typing",
    "has_tapping",
    "typing_ikt_global_mean",
    "tap_rt_mean",
];

const EVENTS_REQUIRED: &[&str] = &["schemaVersion", "sessionId", "participantId", "t", "ms", "tISO"];

const DATASET_REQUIRED: &[&str] = &[
    "schemaVersion",
    "user_id",
    "session_order",
    "session_date",
    "device_family",
    "window_duration_ms",
    "n_key_events",
    "n_tap_hits",
    "n_tap_misses",
    "is_low_activity_window",
    "has_typing",
    "has_tapping",
];

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Parse a comma-separated column list
///
/// Entries are trimmed, empty entries dropped and repeated names kept only
/// at their first position.
pub fn parse_column_list(raw: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for entry in raw.split(',') {
        let name = entry.trim();
        if !name.is_empty() && !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
    }
    columns
}

/// Column sets expected in session exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumns {
    /// Columns the validator requires in `auth_windows`
    pub auth_required: Vec<String>,
    /// Columns the validator requires in `events`
    pub events_required: Vec<String>,
    /// Columns the dataset builder requires (hard error when absent)
    pub dataset_required: Vec<String>,
    /// Count columns that must be non-negative numbers
    pub count_columns: Vec<String>,
    /// Columns restricted to boolean tokens
    pub boolean_columns: Vec<String>,
    /// Columns coerced to nullable integers in the dataset
    pub integer_columns: Vec<String>,
}

impl Default for SchemaColumns {
    fn default() -> Self {
        Self {
            auth_required: owned(AUTH_REQUIRED),
            events_required: owned(EVENTS_REQUIRED),
            dataset_required: owned(DATASET_REQUIRED),
            count_columns: owned(&["n_key_events", "n_tap_hits", "n_tap_misses"]),
            boolean_columns: owned(&["has_typing", "has_tapping", "is_low_activity_window"]),
            integer_columns: owned(&[
                "windowIndex",
                "schemaVersion",
                "session_order",
                "n_key_events",
                "n_tap_hits",
                "n_tap_misses",
                "window_duration_ms",
            ]),
        }
    }
}

/// Fixed window layout of the export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    /// Span of every window in milliseconds
    pub duration_ms: i64,
    /// Offset between consecutive window starts in milliseconds
    pub step_ms: i64,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            step_ms: 15_000,
        }
    }
}

/// Ordered list of candidate column names; the first present one wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackChain(pub Vec<String>);

impl FallbackChain {
    pub fn new(candidates: &[&str]) -> Self {
        Self(owned(candidates))
    }

    /// First candidate accepted by `is_present`
    pub fn resolve<F>(&self, is_present: F) -> Option<&str>
    where
        F: Fn(&str) -> bool,
    {
        self.0.iter().map(String::as_str).find(|c| is_present(c))
    }
}

/// How presence of a modality is read from a window table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRule {
    /// Explicit boolean presence column
    pub column: String,
    /// Numeric proxy columns used when the explicit column is absent
    pub proxies: FallbackChain,
}

impl PresenceRule {
    /// Typing presence: `has_typing`, else a non-missing inter-key timing mean
    pub fn typing() -> Self {
        Self {
            column: "has_typing".to_string(),
            proxies: FallbackChain::new(&[
                "typing_ikt_global_mean",
                "typing_ikt_within_mean",
                "ikt_mean",
            ]),
        }
    }

    /// Tapping presence: `has_tapping`, else a non-missing tap reaction time
    pub fn tapping() -> Self {
        Self {
            column: "has_tapping".to_string(),
            proxies: FallbackChain::new(&["tap_rt_mean"]),
        }
    }
}

/// Inputs of the per-session fatigue slopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlopeConfig {
    /// Column used as the regressor
    pub index_column: String,
    /// Typing metric, preferred name first
    pub typing_metric: FallbackChain,
    /// Tapping metric, preferred name first
    pub tapping_metric: FallbackChain,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            index_column: "windowIndex".to_string(),
            typing_metric: FallbackChain::new(&["typing_ikt_global_mean", "ikt_mean"]),
            tapping_metric: FallbackChain::new(&["tap_rt_mean"]),
        }
    }
}

/// Thresholds of the Verdict Gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    /// Fewer sessions than this fails the run
    pub min_sessions: usize,
    /// Fewer windows than this warns
    pub min_total_windows: usize,
    /// Presence below this fraction fails
    pub presence_fail_below: f64,
    /// Presence below this fraction warns
    pub presence_warn_below: f64,
    /// Mean core missingness at or above this fraction fails
    pub missingness_fail_at: f64,
    /// Mean core missingness at or above this fraction warns
    pub missingness_warn_at: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_sessions: 1,
            min_total_windows: 20,
            presence_fail_below: 0.05,
            presence_warn_below: 0.20,
            missingness_fail_at: 0.90,
            missingness_warn_at: 0.60,
        }
    }
}

/// Thresholds of the prelaunch validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub required_schema_version: i64,
    pub min_sessions: usize,
    pub min_participants: usize,
    pub min_windows_per_session: usize,
    pub min_events_per_session: usize,
    pub min_typing_submits: usize,
    pub min_tap_hits: usize,
    /// Largest tolerated fraction of unparseable `tISO` values
    pub max_invalid_timestamp_frac: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            required_schema_version: DEFAULT_SCHEMA_VERSION,
            min_sessions: 2,
            min_participants: 1,
            min_windows_per_session: 4,
            min_events_per_session: 200,
            min_typing_submits: 10,
            min_tap_hits: 20,
            max_invalid_timestamp_frac: 0.02,
        }
    }
}

/// Configuration of the dataset builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub required_schema_version: i64,
    /// Requested feature columns, in output order
    pub features: Vec<String>,
    pub columns: SchemaColumns,
    pub typing_presence: PresenceRule,
    pub tapping_presence: PresenceRule,
    pub slopes: SlopeConfig,
    pub auth_windows_file: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            required_schema_version: DEFAULT_SCHEMA_VERSION,
            features: owned(DEFAULT_FEATURES),
            columns: SchemaColumns::default(),
            typing_presence: PresenceRule::typing(),
            tapping_presence: PresenceRule::tapping(),
            slopes: SlopeConfig::default(),
            auth_windows_file: AUTH_WINDOWS_FILE.to_string(),
        }
    }
}

/// Where and how the aggregated dataset is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOutput {
    pub out_dir: std::path::PathBuf,
    /// Columnar file name
    pub parquet_name: String,
    /// Also write a CSV copy
    pub write_csv: bool,
    pub csv_name: String,
}

impl Default for DatasetOutput {
    fn default() -> Self {
        Self {
            out_dir: std::path::PathBuf::from("data/processed"),
            parquet_name: "windows.parquet".to_string(),
            write_csv: false,
            csv_name: "windows.csv".to_string(),
        }
    }
}

/// Configuration of the QC summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcConfig {
    pub core_features: Vec<String>,
    pub gate: GateThresholds,
    /// Promote warnings to failures
    pub strict: bool,
    pub typing_presence: PresenceRule,
    pub tapping_presence: PresenceRule,
    pub auth_windows_file: String,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            core_features: owned(DEFAULT_CORE_FEATURES),
            gate: GateThresholds::default(),
            strict: false,
            typing_presence: PresenceRule::typing(),
            tapping_presence: PresenceRule::tapping(),
            auth_windows_file: AUTH_WINDOWS_FILE.to_string(),
        }
    }
}

/// Configuration of the prelaunch validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrelaunchConfig {
    pub thresholds: ValidationThresholds,
    pub columns: SchemaColumns,
    pub geometry: WindowGeometry,
    /// Fail the run when any session has issues
    pub strict: bool,
    pub auth_windows_file: String,
    pub events_file: String,
}

impl Default for PrelaunchConfig {
    fn default() -> Self {
        Self {
            thresholds: ValidationThresholds::default(),
            columns: SchemaColumns::default(),
            geometry: WindowGeometry::default(),
            strict: false,
            auth_windows_file: AUTH_WINDOWS_FILE.to_string(),
            events_file: EVENTS_FILE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_column_list() {
        assert_eq!(
            parse_column_list(" a, b,,c ,a,"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_column_list("").is_empty());
    }

    #[test]
    fn test_fallback_chain_resolves_first_present() {
        let chain = FallbackChain::new(&["typing_ikt_global_mean", "ikt_mean"]);
        assert_eq!(chain.resolve(|c| c == "ikt_mean"), Some("ikt_mean"));
        assert_eq!(chain.resolve(|_| true), Some("typing_ikt_global_mean"));
        assert_eq!(chain.resolve(|_| false), None);
    }

    #[test]
    fn test_defaults_match_export_layout() {
        let columns = SchemaColumns::default();
        assert_eq!(columns.auth_required.len(), 19);
        assert_eq!(columns.events_required.len(), 6);
        assert_eq!(columns.dataset_required.len(), 12);

        let geometry = WindowGeometry::default();
        assert_eq!(geometry.duration_ms, 2 * geometry.step_ms);

        let thresholds = ValidationThresholds::default();
        assert_eq!(thresholds.required_schema_version, 2);
        assert_eq!(thresholds.min_events_per_session, 200);
    }
}
