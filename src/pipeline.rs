//! Pipeline orchestration
//!
//! Entry points used by the `bqc` binary. Each run is a single pass over the
//! session directories under a raw-sessions root:
//!
//! - `build`: aggregate window tables into one sorted dataset
//! - `qc`: presence, missingness and verdict summary
//! - `validate`: per-session prelaunch checks
//! - `sanity`: quick look at one window table

use crate::config::{DatasetConfig, DatasetOutput, PrelaunchConfig, QcConfig, ID_COLUMNS};
use crate::dataset::{build_session, write_csv, write_parquet, WindowDataset};
use crate::error::QcError;
use crate::gate::{evaluate, GateInput};
use crate::presence::{infer_presence, missingness_report};
use crate::report::{PrelaunchReport, QcMeasurements, QcSummary, SanityReport};
use crate::schema::SessionValidator;
use crate::session::discover_sessions;
use crate::table::CsvTable;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Aggregate every session's windows into one dataset
///
/// Sessions are visited in directory-name order; the result is stably sorted
/// by participant, session and window index. Fails with
/// [`QcError::NoWindows`] when no session contributed a row.
pub fn build_windows_dataset(raw_dir: &Path, config: &DatasetConfig) -> Result<WindowDataset, QcError> {
    let sessions = discover_sessions(raw_dir)?;
    info!(raw_dir = %raw_dir.display(), sessions = sessions.len(), "sessions discovered");

    let mut frames = Vec::new();
    for session in sessions {
        match build_session(&session, config)? {
            Some(frame) if !frame.windows.is_empty() => frames.push(frame.windows),
            Some(_) => debug!(session = %session.session_id, "empty window table, skipping"),
            None => {}
        }
    }

    let mut dataset = WindowDataset::concat(frames);
    if dataset.is_empty() {
        return Err(QcError::NoWindows);
    }
    dataset.sort_by_columns(&ID_COLUMNS);

    info!(
        rows = dataset.len(),
        columns = dataset.columns().len(),
        "windows dataset built"
    );
    Ok(dataset)
}

/// Files produced by [`write_windows_dataset`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub parquet: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

impl WrittenOutputs {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.parquet.iter().chain(self.csv.iter())
    }
}

/// Write the dataset to the configured output directory
///
/// A missing columnar writer is tolerated when a CSV copy was requested.
pub fn write_windows_dataset(dataset: &WindowDataset, output: &DatasetOutput) -> Result<WrittenOutputs, QcError> {
    fs::create_dir_all(&output.out_dir)?;
    let mut written = WrittenOutputs::default();

    let parquet_path = output.out_dir.join(&output.parquet_name);
    match write_parquet(dataset, &parquet_path) {
        Ok(()) => written.parquet = Some(parquet_path),
        Err(QcError::ColumnarUnavailable(reason)) if output.write_csv => {
            warn!(%reason, "parquet output skipped, writing CSV only");
        }
        Err(QcError::ColumnarUnavailable(_)) => return Err(QcError::NoOutputWritten),
        Err(e) => return Err(e),
    }

    if output.write_csv {
        let csv_path = output.out_dir.join(&output.csv_name);
        write_csv(dataset, &csv_path)?;
        written.csv = Some(csv_path);
    }

    for path in written.paths() {
        info!(path = %path.display(), rows = dataset.len(), "dataset written");
    }

    Ok(written)
}

/// Compute the QC summary of a raw-sessions root
pub fn run_qc(raw_dir: &Path, config: &QcConfig) -> Result<QcSummary, QcError> {
    let raw_label = raw_dir.display().to_string();

    let mut tables = Vec::new();
    let mut windows_per_session = BTreeMap::new();
    for session in discover_sessions(raw_dir)? {
        let Some(mut table) = session.load_table(&config.auth_windows_file)? else {
            continue;
        };
        table.fill_nulls("sessionId", &session.session_id);
        windows_per_session.insert(session.session_id.clone(), table.len());
        tables.push(table);
    }

    if tables.is_empty() {
        warn!(raw_dir = %raw_label, "no window tables found");
        return Ok(QcSummary::empty(&raw_label, &config.core_features, config.strict));
    }

    let files_found = tables.len();
    let combined = CsvTable::concat(tables);

    let participants = combined
        .column("participantId")
        .map(|cells| cells.into_iter().flatten().collect::<BTreeSet<_>>().len())
        .unwrap_or(0);
    let typing = infer_presence(&combined, &config.typing_presence);
    let tapping = infer_presence(&combined, &config.tapping_presence);
    let missingness = missingness_report(&combined, &config.core_features);

    let input = GateInput {
        sessions: files_found,
        total_windows: combined.len(),
        typing_presence: typing.fraction,
        tapping_presence: tapping.fraction,
        core_missingness: missingness.mean_present_missing(),
    };
    let outcome = evaluate(&input, &config.gate, config.strict);
    debug!(?input, verdict = %outcome.verdict, "gate evaluated");

    let measured = QcMeasurements {
        files_found,
        participants,
        sessions: files_found,
        total_windows: combined.len(),
        windows_per_session,
        typing_presence: typing.fraction,
        tapping_presence: tapping.fraction,
        typing_source: typing.source,
        tapping_source: tapping.source,
        missingness_core: missingness,
    };
    Ok(QcSummary::new(&raw_label, measured, outcome, config.strict))
}

/// Validate every session directory under a raw-sessions root
pub fn run_prelaunch_validation(raw_dir: &Path, config: &PrelaunchConfig) -> Result<PrelaunchReport, QcError> {
    let sessions = discover_sessions(raw_dir)?;
    info!(raw_dir = %raw_dir.display(), sessions = sessions.len(), "sessions discovered");

    let validator = SessionValidator::new(config);
    let mut checks = Vec::new();
    for session in sessions {
        let check = validator.check_dir(&session)?;
        if !check.passed() {
            warn!(session = %check.session_id, issues = check.issues.len(), "session failed checks");
        }
        checks.push(check);
    }

    Ok(PrelaunchReport::assemble(
        &raw_dir.display().to_string(),
        checks,
        config.thresholds,
        config.strict,
    ))
}

/// Summarize one window table
pub fn run_sanity_check(path: &Path) -> Result<SanityReport, QcError> {
    let table = CsvTable::from_path(path)?;
    Ok(SanityReport::from_table(&path.display().to_string(), &table))
}
