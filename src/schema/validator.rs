//! Accumulating session validator
//!
//! Runs every check against a session's `auth_windows` and `events` tables
//! and collects human-readable issues. No check short-circuits another; the
//! only early exit is a missing file, which makes the remaining checks
//! meaningless.

use crate::coerce::{is_bool_token, parse_numeric, parse_timestamp};
use crate::config::PrelaunchConfig;
use crate::error::QcError;
use crate::schema::checks::{missing_columns, schema_version_matches};
use crate::session::SessionDir;
use crate::table::CsvTable;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Event type tag of a submitted typing prompt
pub const TYPING_SUBMIT_EVENT: &str = "typing_submit";

/// Event type tag of a successful tap
pub const TAP_HIT_EVENT: &str = "tap_hit";

/// Volume statistics extracted from one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub windows: usize,
    pub events: usize,
    pub typing_submits: usize,
    pub tap_hits: usize,
}

/// Outcome of validating one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCheck {
    pub session_id: String,
    pub stats: SessionStats,
    /// Issues found, in check order; empty means the session passed
    pub issues: Vec<String>,
    /// Resolved participant, empty when it cannot be determined
    pub participant_id: String,
}

impl SessionCheck {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validator for raw session exports
pub struct SessionValidator<'a> {
    config: &'a PrelaunchConfig,
}

impl<'a> SessionValidator<'a> {
    pub fn new(config: &'a PrelaunchConfig) -> Self {
        Self { config }
    }

    /// Load and validate a session directory
    ///
    /// Missing files are reported as issues; unreadable files are errors.
    pub fn check_dir(&self, session: &SessionDir) -> Result<SessionCheck, QcError> {
        let auth = session.load_table(&self.config.auth_windows_file)?;
        let events = session.load_table(&self.config.events_file)?;

        match (auth, events) {
            (Some(auth), Some(events)) => {
                Ok(self.check_tables(&session.session_id, &auth, &events))
            }
            (auth, events) => {
                let mut issues = Vec::new();
                if auth.is_none() {
                    issues.push(format!("missing {}", self.config.auth_windows_file));
                }
                if events.is_none() {
                    issues.push(format!("missing {}", self.config.events_file));
                }
                Ok(SessionCheck {
                    session_id: session.session_id.clone(),
                    stats: SessionStats::default(),
                    issues,
                    participant_id: String::new(),
                })
            }
        }
    }

    /// Validate already loaded tables of a session
    pub fn check_tables(&self, session_id: &str, auth: &CsvTable, events: &CsvTable) -> SessionCheck {
        let columns = &self.config.columns;
        let thresholds = &self.config.thresholds;
        let version = thresholds.required_schema_version;
        let mut issues = Vec::new();

        check_required_columns(auth, &columns.auth_required, "auth", &mut issues);
        check_required_columns(events, &columns.events_required, "events", &mut issues);

        check_session_ids(auth, session_id, "auth", &mut issues);
        check_session_ids(events, session_id, "events", &mut issues);

        check_schema_version(auth, version, "auth", &mut issues);
        check_schema_version(events, version, "events", &mut issues);

        let participant_id = resolve_participant(auth, events, &mut issues);

        self.check_window_durations(auth, &mut issues);

        for column in &columns.count_columns {
            check_non_negative(auth, column, &mut issues);
        }
        for column in &columns.boolean_columns {
            check_boolean_tokens(auth, column, &mut issues);
        }

        self.check_window_sequence(auth, &mut issues);

        check_event_ordering(events, &mut issues);
        self.check_timestamps(events, &mut issues);

        let stats = SessionStats {
            windows: auth.len(),
            events: events.len(),
            typing_submits: count_event_type(events, TYPING_SUBMIT_EVENT),
            tap_hits: count_event_type(events, TAP_HIT_EVENT),
        };
        self.check_volume(&stats, &mut issues);

        debug!(
            session = %session_id,
            issues = issues.len(),
            windows = stats.windows,
            events = stats.events,
            "session checked"
        );

        SessionCheck {
            session_id: session_id.to_string(),
            stats,
            issues,
            participant_id,
        }
    }

    fn check_window_durations(&self, auth: &CsvTable, issues: &mut Vec<String>) {
        let expected = self.config.geometry.duration_ms as f64;

        if let (Some(starts), Some(ends)) = (
            auth.numeric_column("windowStartMs"),
            auth.numeric_column("windowEndMs"),
        ) {
            let all_exact = starts
                .iter()
                .zip(&ends)
                .all(|(start, end)| matches!((start, end), (Some(s), Some(e)) if e - s == expected));
            if !all_exact {
                issues.push(format!(
                    "window durations are not all {} ms",
                    self.config.geometry.duration_ms
                ));
            }
        }

        if let Some(durations) = auth.numeric_column("window_duration_ms") {
            if !durations.iter().all(|d| *d == Some(expected)) {
                issues.push(format!(
                    "window_duration_ms must be {} for all windows",
                    self.config.geometry.duration_ms
                ));
            }
        }
    }

    /// Duplicate indices and start spacing, in window-index order
    fn check_window_sequence(&self, auth: &CsvTable, issues: &mut Vec<String>) {
        let (Some(indices), Some(starts)) = (auth.column("windowIndex"), auth.numeric_column("windowStartMs"))
        else {
            return;
        };

        let mut seen = HashSet::new();
        let has_duplicates = !indices.iter().all(|cell| seen.insert(window_key(*cell)));
        if has_duplicates {
            issues.push("duplicate windowIndex values".to_string());
        }

        if indices.len() > 1 {
            let numeric: Vec<Option<f64>> = indices.iter().map(|c| parse_numeric(*c)).collect();
            let mut order: Vec<usize> = (0..numeric.len()).collect();
            order.sort_by(|&a, &b| cmp_nulls_last(numeric[a], numeric[b]));

            let step = self.config.geometry.step_ms as f64;
            let evenly_spaced = order.windows(2).all(|pair| match (starts[pair[0]], starts[pair[1]]) {
                (Some(prev), Some(next)) => next - prev == step,
                _ => true,
            });
            if !evenly_spaced {
                issues.push(format!(
                    "window starts are not all {} ms apart",
                    self.config.geometry.step_ms
                ));
            }
        }
    }

    fn check_timestamps(&self, events: &CsvTable, issues: &mut Vec<String>) {
        let Some(cells) = events.column("tISO") else {
            return;
        };
        if cells.is_empty() {
            return;
        }

        let invalid = cells.iter().filter(|c| parse_timestamp(**c).is_none()).count();
        let invalid_frac = invalid as f64 / cells.len() as f64;
        let max_frac = self.config.thresholds.max_invalid_timestamp_frac;
        if invalid_frac > max_frac {
            issues.push(format!("more than {}% invalid tISO values", max_frac * 100.0));
        }
    }

    fn check_volume(&self, stats: &SessionStats, issues: &mut Vec<String>) {
        let t = &self.config.thresholds;
        if stats.windows < t.min_windows_per_session {
            issues.push(format!(
                "too few windows: {} < {}",
                stats.windows, t.min_windows_per_session
            ));
        }
        if stats.events < t.min_events_per_session {
            issues.push(format!(
                "too few events: {} < {}",
                stats.events, t.min_events_per_session
            ));
        }
        if stats.typing_submits < t.min_typing_submits {
            issues.push(format!(
                "too few {} events: {} < {}",
                TYPING_SUBMIT_EVENT, stats.typing_submits, t.min_typing_submits
            ));
        }
        if stats.tap_hits < t.min_tap_hits {
            issues.push(format!(
                "too few {} events: {} < {}",
                TAP_HIT_EVENT, stats.tap_hits, t.min_tap_hits
            ));
        }
    }
}

fn check_required_columns(table: &CsvTable, required: &[String], label: &str, issues: &mut Vec<String>) {
    let mut missing = missing_columns(table, required);
    if !missing.is_empty() {
        missing.sort();
        issues.push(format!("{} missing columns: {:?}", label, missing));
    }
}

fn check_session_ids(table: &CsvTable, session_id: &str, label: &str, issues: &mut Vec<String>) {
    if let Some(cells) = table.column("sessionId") {
        if cells.iter().any(|c| *c != Some(session_id)) {
            issues.push(format!("{} sessionId differs from folder name", label));
        }
    }
}

fn check_schema_version(table: &CsvTable, version: i64, label: &str, issues: &mut Vec<String>) {
    if table.has_column("schemaVersion") && !schema_version_matches(table, version) {
        issues.push(format!("{} schemaVersion must be {}", label, version));
    }
}

/// Distinct non-null participant IDs, sorted; `None` if the column is absent
fn distinct_participants(table: &CsvTable) -> Option<BTreeSet<String>> {
    table
        .column("participantId")
        .map(|cells| cells.into_iter().flatten().map(str::to_string).collect())
}

fn resolve_participant(auth: &CsvTable, events: &CsvTable, issues: &mut Vec<String>) -> String {
    let mut participant_id = String::new();

    if let Some(ids) = distinct_participants(auth) {
        if ids.len() > 1 {
            issues.push("multiple participantId values in auth".to_string());
        } else if let Some(id) = ids.into_iter().next() {
            participant_id = id;
        }
    }

    if let Some(event_ids) = distinct_participants(events) {
        if event_ids.len() > 1 {
            issues.push("multiple participantId values in events".to_string());
        }
        if !participant_id.is_empty() && !event_ids.is_empty() && !event_ids.contains(&participant_id) {
            issues.push("participantId mismatch between auth and events".to_string());
        }
    }

    participant_id
}

fn check_non_negative(table: &CsvTable, column: &str, issues: &mut Vec<String>) {
    if let Some(values) = table.numeric_column(column) {
        if !values.iter().all(|v| matches!(v, Some(x) if *x >= 0.0)) {
            issues.push(format!("{} must be non-negative numeric", column));
        }
    }
}

fn check_boolean_tokens(table: &CsvTable, column: &str, issues: &mut Vec<String>) {
    if let Some(cells) = table.column(column) {
        if !cells.iter().all(|c| is_bool_token(*c)) {
            issues.push(format!("{} has non-boolean values", column));
        }
    }
}

fn check_event_ordering(events: &CsvTable, issues: &mut Vec<String>) {
    let Some(ms) = events.numeric_column("ms") else {
        return;
    };

    if ms.iter().any(Option::is_none) {
        issues.push("events has non-numeric ms values".to_string());
    } else if ms.windows(2).any(|pair| pair[1] < pair[0]) {
        issues.push("events ms is not monotonic nondecreasing".to_string());
    }
}

fn count_event_type(events: &CsvTable, event_type: &str) -> usize {
    events
        .column("t")
        .map(|cells| cells.iter().filter(|c| **c == Some(event_type)).count())
        .unwrap_or(0)
}

/// Identity of a window index for duplicate detection
///
/// Numeric indices compare by value so `1` and `1.0` collide; nulls collide
/// with each other.
fn window_key(cell: Option<&str>) -> String {
    match (cell, parse_numeric(cell)) {
        (_, Some(value)) => format!("n:{}", value),
        (Some(text), None) => format!("s:{}", text),
        (None, None) => "null".to_string(),
    }
}

fn cmp_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
