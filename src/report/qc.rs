use crate::gate::{percent, GateOutcome};
use crate::presence::MissingnessReport;
use crate::report::{generated_at_utc, Report};
use crate::types::{ReportProducer, Verdict};
use serde::Serialize;
use std::collections::BTreeMap;

/// Fail reason when the raw directory holds no window tables at all
pub const NO_WINDOW_FILES_REASON: &str = "No auth_windows.csv files found.";

/// QC summary of a raw sessions directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcSummary {
    pub generated_at_utc: String,
    pub producer: ReportProducer,
    pub raw_sessions_dir: String,
    pub auth_windows_files_found: usize,
    pub participants_count: usize,
    pub sessions_count: usize,
    pub total_windows: usize,
    pub windows_per_session: BTreeMap<String, usize>,
    pub typing_presence: f64,
    pub tapping_presence: f64,
    pub typing_presence_source: String,
    pub tapping_presence_source: String,
    pub missingness_core: MissingnessReport,
    pub strict: bool,
    pub verdict: Verdict,
    pub fail_reasons: Vec<String>,
    pub warn_reasons: Vec<String>,
}

/// Measured part of a QC summary
#[derive(Debug, Clone, PartialEq)]
pub struct QcMeasurements {
    pub files_found: usize,
    pub participants: usize,
    pub sessions: usize,
    pub total_windows: usize,
    pub windows_per_session: BTreeMap<String, usize>,
    pub typing_presence: f64,
    pub tapping_presence: f64,
    pub typing_source: String,
    pub tapping_source: String,
    pub missingness_core: MissingnessReport,
}

impl QcSummary {
    pub fn new(raw_sessions_dir: &str, measured: QcMeasurements, outcome: GateOutcome, strict: bool) -> Self {
        Self {
            generated_at_utc: generated_at_utc(),
            producer: ReportProducer::new(),
            raw_sessions_dir: raw_sessions_dir.to_string(),
            auth_windows_files_found: measured.files_found,
            participants_count: measured.participants,
            sessions_count: measured.sessions,
            total_windows: measured.total_windows,
            windows_per_session: measured.windows_per_session,
            typing_presence: measured.typing_presence,
            tapping_presence: measured.tapping_presence,
            typing_presence_source: measured.typing_source,
            tapping_presence_source: measured.tapping_source,
            missingness_core: measured.missingness_core,
            strict,
            verdict: outcome.verdict,
            fail_reasons: outcome.fail_reasons,
            warn_reasons: outcome.warn_reasons,
        }
    }

    /// Summary of a directory without any window table
    pub fn empty(raw_sessions_dir: &str, core_features: &[String], strict: bool) -> Self {
        let measured = QcMeasurements {
            files_found: 0,
            participants: 0,
            sessions: 0,
            total_windows: 0,
            windows_per_session: BTreeMap::new(),
            typing_presence: 0.0,
            tapping_presence: 0.0,
            typing_source: crate::presence::NO_PRESENCE_SOURCE.to_string(),
            tapping_source: crate::presence::NO_PRESENCE_SOURCE.to_string(),
            missingness_core: MissingnessReport::all_absent(core_features),
        };
        let outcome = GateOutcome {
            verdict: Verdict::Fail,
            fail_reasons: vec![NO_WINDOW_FILES_REASON.to_string()],
            warn_reasons: Vec::new(),
        };
        Self::new(raw_sessions_dir, measured, outcome, strict)
    }
}

impl Report for QcSummary {
    fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# QC Summary".to_string(),
            String::new(),
            format!("- **Generated:** {}", self.generated_at_utc),
            format!("- **Verdict:** **{}**", self.verdict),
            String::new(),
            "## Counts".to_string(),
            format!("- Participants: **{}**", self.participants_count),
            format!("- Sessions: **{}**", self.sessions_count),
            format!("- Total windows: **{}**", self.total_windows),
            String::new(),
            "## Presence".to_string(),
            format!("- % windows with typing: **{}**", percent(self.typing_presence)),
            format!("- % windows with tapping: **{}**", percent(self.tapping_presence)),
            String::new(),
        ];

        for (title, reasons) in [
            ("## Fail reasons", &self.fail_reasons),
            ("## Warn reasons", &self.warn_reasons),
        ] {
            if !reasons.is_empty() {
                lines.push(title.to_string());
                lines.extend(reasons.iter().map(|r| format!("- {}", r)));
                lines.push(String::new());
            }
        }

        lines.push("## Missingness (core features)".to_string());
        lines.push(String::new());
        for (column, info) in self.missingness_core.iter() {
            let present = if info.is_present() { "present" } else { "MISSING COLUMN" };
            lines.push(format!(
                "- `{}`: {}, missing={}",
                column,
                present,
                percent(info.missing_frac)
            ));
        }
        lines.push(String::new());

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Vec<String> {
        vec!["participantId".to_string(), "tap_rt_mean".to_string()]
    }

    #[test]
    fn test_empty_summary() {
        let summary = QcSummary::empty("data/raw/sessions", &core(), false);
        assert_eq!(summary.verdict, Verdict::Fail);
        assert_eq!(summary.fail_reasons, vec![NO_WINDOW_FILES_REASON]);
        assert_eq!(summary.typing_presence_source, "none");

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["verdict"], "FAIL");
        assert_eq!(json["missingness_core"]["tap_rt_mean"]["present_in_schema"], 0);
        assert_eq!(json["producer"]["name"], crate::PRODUCER_NAME);
    }

    #[test]
    fn test_markdown_sections() {
        let summary = QcSummary::empty("raw", &core(), false);
        let md = summary.to_markdown();
        assert!(md.starts_with("# QC Summary\n"));
        assert!(md.contains("- **Verdict:** **FAIL**"));
        assert!(md.contains("- % windows with typing: **0.0%**"));
        assert!(md.contains("## Fail reasons\n- No auth_windows.csv files found.\n"));
        assert!(!md.contains("## Warn reasons"));
        assert!(md.contains("- `tap_rt_mean`: MISSING COLUMN, missing=100.0%"));
    }
}
