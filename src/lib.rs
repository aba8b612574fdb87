//! Biometrics QC - Quality control and dataset building for behavioural-biometrics sessions
//!
//! Raw sessions are exported as one directory per session holding an
//! `auth_windows.csv` (one row per 30 s window) and an `events.csv` (one row
//! per input event). This crate turns those exports into:
//!
//! - **Prelaunch validation**: per-session schema, timing and volume checks
//! - **QC summary**: presence, missingness and a PASS/WARN/FAIL verdict
//! - **Windows dataset**: one typed, sorted table of windows with per-session
//!   fatigue slopes, written as Parquet (and optionally CSV)
//! - **Sanity check**: a quick look at a single window table

pub mod coerce;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod presence;
pub mod report;
pub mod schema;
pub mod session;
pub mod slope;
pub mod table;
pub mod types;

pub use config::{DatasetConfig, DatasetOutput, PrelaunchConfig, QcConfig};
pub use dataset::WindowDataset;
pub use error::QcError;
pub use pipeline::{
    build_windows_dataset, run_prelaunch_validation, run_qc, run_sanity_check, write_windows_dataset,
};
pub use report::{PrelaunchReport, QcSummary, Report, SanityReport};
pub use types::Verdict;

/// Version embedded in every report
pub const QC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report provenance
pub const PRODUCER_NAME: &str = "biometrics-qc";
