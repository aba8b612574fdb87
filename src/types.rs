//! Shared report types
//!
//! Verdicts and provenance metadata embedded in every report written by the
//! QC, validation and dataset entry points.

use crate::{PRODUCER_NAME, QC_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tri-state outcome of a QC or validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warn => "WARN",
            Verdict::Fail => "FAIL",
        }
    }

    /// Whether the run is usable (PASS or WARN)
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer metadata for provenance tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Producer name
    pub name: String,
    /// Producer version
    pub version: String,
    /// Unique identifier of the run that produced the report
    pub instance_id: String,
}

impl Default for ReportProducer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportProducer {
    /// Create producer metadata with a fresh instance ID
    pub fn new() -> Self {
        Self {
            name: PRODUCER_NAME.to_string(),
            version: QC_VERSION.to_string(),
            instance_id: Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"PASS\"");
        assert_eq!(serde_json::to_string(&Verdict::Warn).unwrap(), "\"WARN\"");
        assert_eq!(serde_json::to_string(&Verdict::Fail).unwrap(), "\"FAIL\"");
    }

    #[test]
    fn test_verdict_acceptable() {
        assert!(Verdict::Pass.is_acceptable());
        assert!(Verdict::Warn.is_acceptable());
        assert!(!Verdict::Fail.is_acceptable());
    }

    #[test]
    fn test_producer_instance_ids_are_unique() {
        let a = ReportProducer::new();
        let b = ReportProducer::new();
        assert_eq!(a.name, PRODUCER_NAME);
        assert_ne!(a.instance_id, b.instance_id);
    }
}
