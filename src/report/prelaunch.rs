use crate::config::ValidationThresholds;
use crate::report::{generated_at_utc, Report};
use crate::schema::{SessionCheck, SessionStats};
use crate::types::{ReportProducer, Verdict};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-session entry of the prelaunch report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEntry {
    #[serde(flatten)]
    pub stats: SessionStats,
    pub status: Verdict,
    pub issues: Vec<String>,
}

/// Prelaunch validation report of a raw sessions directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrelaunchReport {
    pub generated_at_utc: String,
    pub producer: ReportProducer,
    pub raw_sessions_dir: String,
    pub verdict: Verdict,
    pub strict: bool,
    pub sessions_scanned: usize,
    pub participants_found: usize,
    pub thresholds: ValidationThresholds,
    pub global_checks: Vec<String>,
    pub sessions: BTreeMap<String, SessionEntry>,
}

/// Render a `>=` threshold check and report whether it held
fn global_check(label: &str, actual: usize, minimum: usize) -> (String, bool) {
    if actual < minimum {
        (format!("FAIL: {} {} < {}", label, actual, minimum), false)
    } else {
        (format!("PASS: {} {} >= {}", label, actual, minimum), true)
    }
}

impl PrelaunchReport {
    /// Assemble the report from per-session checks
    ///
    /// The run fails when a global check fails. Session issues fail only
    /// their own session unless `strict` is set.
    pub fn assemble(
        raw_sessions_dir: &str,
        checks: Vec<SessionCheck>,
        thresholds: ValidationThresholds,
        strict: bool,
    ) -> Self {
        let participants: BTreeSet<&str> = checks
            .iter()
            .map(|c| c.participant_id.as_str())
            .filter(|p| !p.is_empty())
            .collect();
        let participants_found = participants.len();
        let sessions_scanned = checks.len();

        let mut global_checks = Vec::new();
        let mut global_ok = true;
        for (label, actual, minimum) in [
            ("sessions", sessions_scanned, thresholds.min_sessions),
            ("participants", participants_found, thresholds.min_participants),
        ] {
            let (line, ok) = global_check(label, actual, minimum);
            global_checks.push(line);
            global_ok &= ok;
        }

        let any_session_failed = checks.iter().any(|c| !c.passed());
        let verdict = if !global_ok || (strict && any_session_failed) {
            Verdict::Fail
        } else {
            Verdict::Pass
        };

        let sessions = checks
            .into_iter()
            .map(|check| {
                let status = if check.passed() { Verdict::Pass } else { Verdict::Fail };
                (
                    check.session_id,
                    SessionEntry {
                        stats: check.stats,
                        status,
                        issues: check.issues,
                    },
                )
            })
            .collect();

        Self {
            generated_at_utc: generated_at_utc(),
            producer: ReportProducer::new(),
            raw_sessions_dir: raw_sessions_dir.to_string(),
            verdict,
            strict,
            sessions_scanned,
            participants_found,
            thresholds,
            global_checks,
            sessions,
        }
    }

    /// Sessions marked FAIL
    pub fn failed_sessions(&self) -> impl Iterator<Item = &str> {
        self.sessions
            .iter()
            .filter(|(_, entry)| entry.status == Verdict::Fail)
            .map(|(sid, _)| sid.as_str())
    }
}

impl Report for PrelaunchReport {
    fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# Prelaunch Validation".to_string(),
            String::new(),
            format!("- **Generated:** {}", self.generated_at_utc),
            format!("- **Verdict:** **{}**", self.verdict),
            format!("- **Sessions scanned:** {}", self.sessions_scanned),
            format!("- **Participants found:** {}", self.participants_found),
            String::new(),
            "## Global checks".to_string(),
        ];
        lines.extend(self.global_checks.iter().map(|c| format!("- {}", c)));
        lines.push(String::new());

        lines.push("## Session checks".to_string());
        for (sid, entry) in &self.sessions {
            lines.push(format!("- `{}`: {}", sid, entry.status));
            lines.extend(entry.issues.iter().map(|issue| format!("  - {}", issue)));
        }
        lines.push(String::new());

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(sid: &str, pid: &str, issues: &[&str]) -> SessionCheck {
        SessionCheck {
            session_id: sid.to_string(),
            stats: SessionStats {
                windows: 4,
                events: 250,
                typing_submits: 12,
                tap_hits: 30,
            },
            issues: issues.iter().map(|s| s.to_string()).collect(),
            participant_id: pid.to_string(),
        }
    }

    #[test]
    fn test_global_checks() {
        let report = PrelaunchReport::assemble(
            "raw",
            vec![check("s1", "p1", &[])],
            ValidationThresholds::default(),
            false,
        );
        assert_eq!(
            report.global_checks,
            vec!["FAIL: sessions 1 < 2", "PASS: participants 1 >= 1"]
        );
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn test_session_issues_fail_run_only_in_strict_mode() {
        let checks = vec![check("s1", "p1", &["too few windows: 3 < 4"]), check("s2", "p1", &[])];

        let lenient =
            PrelaunchReport::assemble("raw", checks.clone(), ValidationThresholds::default(), false);
        assert_eq!(lenient.verdict, Verdict::Pass);
        assert_eq!(lenient.failed_sessions().collect::<Vec<_>>(), vec!["s1"]);

        let strict = PrelaunchReport::assemble("raw", checks, ValidationThresholds::default(), true);
        assert_eq!(strict.verdict, Verdict::Fail);
    }

    #[test]
    fn test_empty_participant_ids_not_counted() {
        let report = PrelaunchReport::assemble(
            "raw",
            vec![check("s1", "", &[]), check("s2", "", &[])],
            ValidationThresholds::default(),
            false,
        );
        assert_eq!(report.participants_found, 0);
        assert_eq!(report.global_checks[1], "FAIL: participants 0 < 1");
    }

    #[test]
    fn test_json_and_markdown() {
        let report = PrelaunchReport::assemble(
            "raw",
            vec![check("s1", "p1", &["missing events.csv"]), check("s2", "p2", &[])],
            ValidationThresholds::default(),
            false,
        );

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["sessions"]["s1"]["status"], "FAIL");
        assert_eq!(json["sessions"]["s1"]["windows"], 4);
        assert_eq!(json["sessions"]["s2"]["issues"], serde_json::json!([]));
        assert_eq!(json["thresholds"]["min_tap_hits"], 20);

        let md = report.to_markdown();
        assert!(md.contains("## Global checks\n- PASS: sessions 2 >= 2\n"));
        assert!(md.contains("- `s1`: FAIL\n  - missing events.csv\n- `s2`: PASS\n"));
    }
}
