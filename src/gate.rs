//! Verdict gate
//!
//! Turns aggregate QC statistics into a PASS/WARN/FAIL verdict. Every rule is
//! evaluated; reasons are collected rather than returned at the first hit.

use crate::config::GateThresholds;
use crate::types::Verdict;
use serde::Serialize;

/// Aggregate statistics the gate decides on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInput {
    pub sessions: usize,
    pub total_windows: usize,
    pub typing_presence: f64,
    pub tapping_presence: f64,
    /// Mean missingness over present core columns; `None` when none is present
    pub core_missingness: Option<f64>,
}

/// Verdict with the reasons that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    pub verdict: Verdict,
    pub fail_reasons: Vec<String>,
    pub warn_reasons: Vec<String>,
}

/// Format a fraction as a percentage with one decimal
pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Threshold label such as `5%`
fn threshold_label(fraction: f64) -> String {
    format!("{}%", (fraction * 100.0).round())
}

fn check_presence(
    label: &str,
    fraction: f64,
    thresholds: &GateThresholds,
    fails: &mut Vec<String>,
    warns: &mut Vec<String>,
) {
    if fraction < thresholds.presence_fail_below {
        fails.push(format!(
            "{} presence too low (<{}): {}",
            label,
            threshold_label(thresholds.presence_fail_below),
            percent(fraction)
        ));
    } else if fraction < thresholds.presence_warn_below {
        warns.push(format!(
            "{} presence low (<{}): {}",
            label,
            threshold_label(thresholds.presence_warn_below),
            percent(fraction)
        ));
    }
}

/// Apply the gate rules
///
/// In strict mode a run with only warnings fails.
pub fn evaluate(input: &GateInput, thresholds: &GateThresholds, strict: bool) -> GateOutcome {
    let mut fails = Vec::new();
    let mut warns = Vec::new();

    if input.sessions < thresholds.min_sessions {
        fails.push("No sessions found.".to_string());
    }
    if input.total_windows < thresholds.min_total_windows {
        warns.push(format!(
            "Low total windows (<{}): {}",
            thresholds.min_total_windows, input.total_windows
        ));
    }

    check_presence("Typing", input.typing_presence, thresholds, &mut fails, &mut warns);
    check_presence("Tapping", input.tapping_presence, thresholds, &mut fails, &mut warns);

    match input.core_missingness {
        Some(avg) if avg >= thresholds.missingness_fail_at => fails.push(format!(
            "Core missingness avg too high (>={}): {}",
            threshold_label(thresholds.missingness_fail_at),
            percent(avg)
        )),
        Some(avg) if avg >= thresholds.missingness_warn_at => warns.push(format!(
            "Core missingness avg high (>={}): {}",
            threshold_label(thresholds.missingness_warn_at),
            percent(avg)
        )),
        Some(_) => {}
        None => warns.push("No core columns present to evaluate missingness.".to_string()),
    }

    let verdict = if !fails.is_empty() {
        Verdict::Fail
    } else if !warns.is_empty() {
        if strict {
            Verdict::Fail
        } else {
            Verdict::Warn
        }
    } else {
        Verdict::Pass
    };

    GateOutcome {
        verdict,
        fail_reasons: fails,
        warn_reasons: warns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn healthy() -> GateInput {
        GateInput {
            sessions: 3,
            total_windows: 120,
            typing_presence: 0.8,
            tapping_presence: 0.7,
            core_missingness: Some(0.1),
        }
    }

    #[test]
    fn test_healthy_passes() {
        let outcome = evaluate(&healthy(), &GateThresholds::default(), true);
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(outcome.fail_reasons.is_empty());
        assert!(outcome.warn_reasons.is_empty());
    }

    #[test]
    fn test_no_sessions_fails() {
        let input = GateInput {
            sessions: 0,
            ..healthy()
        };
        let outcome = evaluate(&input, &GateThresholds::default(), false);
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome
            .fail_reasons
            .iter()
            .any(|r| r.contains("No sessions found")));
    }

    #[test]
    fn test_low_typing_presence_warns_or_fails_in_strict() {
        let input = GateInput {
            typing_presence: 0.10,
            ..healthy()
        };
        let lenient = evaluate(&input, &GateThresholds::default(), false);
        assert_eq!(lenient.verdict, Verdict::Warn);
        assert_eq!(lenient.warn_reasons, vec!["Typing presence low (<20%): 10.0%"]);

        let strict = evaluate(&input, &GateThresholds::default(), true);
        assert_eq!(strict.verdict, Verdict::Fail);
        assert!(strict.fail_reasons.is_empty());
    }

    #[test]
    fn test_rules_are_independent() {
        let input = GateInput {
            sessions: 0,
            total_windows: 0,
            typing_presence: 0.0,
            tapping_presence: 0.12,
            core_missingness: Some(0.95),
        };
        let outcome = evaluate(&input, &GateThresholds::default(), false);
        assert_eq!(
            outcome.fail_reasons,
            vec![
                "No sessions found.",
                "Typing presence too low (<5%): 0.0%",
                "Core missingness avg too high (>=90%): 95.0%",
            ]
        );
        assert_eq!(
            outcome.warn_reasons,
            vec![
                "Low total windows (<20): 0",
                "Tapping presence low (<20%): 12.0%",
            ]
        );
    }

    #[test]
    fn test_missingness_warn_and_absent_core() {
        let input = GateInput {
            core_missingness: Some(0.6),
            ..healthy()
        };
        let outcome = evaluate(&input, &GateThresholds::default(), false);
        assert_eq!(outcome.warn_reasons, vec!["Core missingness avg high (>=60%): 60.0%"]);

        let input = GateInput {
            core_missingness: None,
            ..healthy()
        };
        let outcome = evaluate(&input, &GateThresholds::default(), false);
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert_eq!(
            outcome.warn_reasons,
            vec!["No core columns present to evaluate missingness."]
        );
    }

    #[test]
    fn test_percent_format() {
        assert_eq!(percent(0.1234), "12.3%");
        assert_eq!(percent(1.0), "100.0%");
    }
}
