//! Report documents
//!
//! Every report serializes to pretty JSON and renders a companion text view
//! (Markdown for the QC and prelaunch reports, plain text for the sanity
//! check).

mod prelaunch;
mod qc;
mod sanity;

pub use prelaunch::*;
pub use qc::*;
pub use sanity::*;

use crate::error::QcError;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// A report with JSON and Markdown renderings
pub trait Report: Serialize {
    fn to_markdown(&self) -> String;

    fn to_json(&self) -> Result<String, QcError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write a report as JSON and Markdown, creating parent directories
pub fn write_report_pair<R: Report>(report: &R, json_path: &Path, md_path: &Path) -> Result<(), QcError> {
    for path in [json_path, md_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(json_path, report.to_json()?)?;
    fs::write(md_path, report.to_markdown())?;
    Ok(())
}

/// Current UTC time in RFC 3339
pub(crate) fn generated_at_utc() -> String {
    Utc::now().to_rfc3339()
}
