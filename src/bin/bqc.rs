//! bqc - Command-line interface for Biometrics QC
//!
//! Commands:
//! - build: Aggregate session windows into one dataset (Parquet, optional CSV)
//! - qc: Summarize presence and missingness and gate the data
//! - validate: Run prelaunch checks on every session
//! - sanity: Quick look at a single auth_windows table

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use biometrics_qc::config::{
    parse_column_list, DatasetConfig, DatasetOutput, PrelaunchConfig, QcConfig, ValidationThresholds,
    DEFAULT_CORE_FEATURES, DEFAULT_FEATURES, DEFAULT_SCHEMA_VERSION,
};
use biometrics_qc::report::{write_report_pair, Report};
use biometrics_qc::{pipeline, QcError, Verdict, QC_VERSION};

/// bqc - Quality control for behavioural-biometrics session exports
#[derive(Parser)]
#[command(name = "bqc")]
#[command(version = QC_VERSION)]
#[command(about = "Validate, gate and aggregate behavioural-biometrics sessions", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "biometrics_qc=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate session windows into one dataset
    Build {
        /// Directory holding one subdirectory per session
        #[arg(long, default_value = "data/raw/sessions")]
        raw_sessions_dir: PathBuf,

        /// Output directory
        #[arg(long, default_value = "data/processed")]
        out_dir: PathBuf,

        /// Parquet file name
        #[arg(long, default_value = "windows.parquet")]
        out_parquet: String,

        /// Also write a CSV copy
        #[arg(long)]
        write_csv: bool,

        /// CSV file name
        #[arg(long, default_value = "windows.csv")]
        out_csv: String,

        /// Comma-separated feature columns, in output order
        #[arg(long)]
        features: Option<String>,

        /// Required schemaVersion of every window
        #[arg(long, default_value_t = DEFAULT_SCHEMA_VERSION)]
        required_schema_version: i64,
    },

    /// Summarize presence and missingness and gate the data
    Qc {
        #[arg(long, default_value = "data/raw/sessions")]
        raw_sessions_dir: PathBuf,

        /// Directory for the JSON and Markdown reports
        #[arg(long, default_value = "reports")]
        reports_dir: PathBuf,

        /// Comma-separated core feature columns for missingness
        #[arg(long)]
        core_features: Option<String>,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,

        #[arg(long, default_value = "qc_summary.json")]
        out_json: String,

        #[arg(long, default_value = "qc_summary.md")]
        out_md: String,
    },

    /// Run prelaunch checks on every session
    Validate {
        #[arg(long, default_value = "data/raw/sessions")]
        raw_sessions_dir: PathBuf,

        /// Directory for the JSON and Markdown reports
        #[arg(long, default_value = "reports")]
        reports_dir: PathBuf,

        #[arg(long, default_value = "prelaunch_validation.json")]
        out_json: String,

        #[arg(long, default_value = "prelaunch_validation.md")]
        out_md: String,

        #[arg(long, default_value_t = 2)]
        min_sessions: usize,

        #[arg(long, default_value_t = 1)]
        min_participants: usize,

        #[arg(long, default_value_t = 4)]
        min_windows_per_session: usize,

        #[arg(long, default_value_t = 200)]
        min_events_per_session: usize,

        #[arg(long, default_value_t = 10)]
        min_typing_submits: usize,

        #[arg(long, default_value_t = 20)]
        min_tap_hits: usize,

        #[arg(long, default_value_t = DEFAULT_SCHEMA_VERSION)]
        required_schema_version: i64,

        /// Fail the run when any session has issues
        #[arg(long)]
        strict: bool,
    },

    /// Quick look at a single auth_windows table
    Sanity {
        /// auth_windows CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let failure = match run(cli) {
        Ok(verdict) if verdict.is_acceptable() => return ExitCode::SUCCESS,
        Ok(_) => BqcCliError::VerdictFail,
        Err(e) => e,
    };
    eprintln!("{}", serde_json::to_string(&CliError::from(failure)).unwrap_or_else(|_| "Unknown error".to_string()));
    ExitCode::FAILURE
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<Verdict, BqcCliError> {
    match cli.command {
        Commands::Build {
            raw_sessions_dir,
            out_dir,
            out_parquet,
            write_csv,
            out_csv,
            features,
            required_schema_version,
        } => {
            let config = DatasetConfig {
                required_schema_version,
                features: features
                    .as_deref()
                    .map(parse_column_list)
                    .unwrap_or_else(|| owned(DEFAULT_FEATURES)),
                ..DatasetConfig::default()
            };
            let output = DatasetOutput {
                out_dir,
                parquet_name: out_parquet,
                write_csv,
                csv_name: out_csv,
            };
            cmd_build(&raw_sessions_dir, &config, &output)
        }

        Commands::Qc {
            raw_sessions_dir,
            reports_dir,
            core_features,
            strict,
            out_json,
            out_md,
        } => {
            let config = QcConfig {
                core_features: core_features
                    .as_deref()
                    .map(parse_column_list)
                    .unwrap_or_else(|| owned(DEFAULT_CORE_FEATURES)),
                strict,
                ..QcConfig::default()
            };
            let summary = pipeline::run_qc(&raw_sessions_dir, &config)?;
            write_reports(&summary, &reports_dir, &out_json, &out_md)?;
            println!("Verdict: {}", summary.verdict);
            Ok(summary.verdict)
        }

        Commands::Validate {
            raw_sessions_dir,
            reports_dir,
            out_json,
            out_md,
            min_sessions,
            min_participants,
            min_windows_per_session,
            min_events_per_session,
            min_typing_submits,
            min_tap_hits,
            required_schema_version,
            strict,
        } => {
            let config = PrelaunchConfig {
                thresholds: ValidationThresholds {
                    required_schema_version,
                    min_sessions,
                    min_participants,
                    min_windows_per_session,
                    min_events_per_session,
                    min_typing_submits,
                    min_tap_hits,
                    ..ValidationThresholds::default()
                },
                strict,
                ..PrelaunchConfig::default()
            };
            let report = pipeline::run_prelaunch_validation(&raw_sessions_dir, &config)?;
            write_reports(&report, &reports_dir, &out_json, &out_md)?;
            println!("Verdict: {}", report.verdict);
            Ok(report.verdict)
        }

        Commands::Sanity { input, json } => {
            let report = pipeline::run_sanity_check(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
            Ok(Verdict::Pass)
        }
    }
}

fn cmd_build(raw_dir: &Path, config: &DatasetConfig, output: &DatasetOutput) -> Result<Verdict, BqcCliError> {
    let dataset = pipeline::build_windows_dataset(raw_dir, config)?;
    let written = pipeline::write_windows_dataset(&dataset, output)?;
    for path in written.paths() {
        println!("Wrote {}", path.display());
    }
    println!("Rows: {}", dataset.len());
    Ok(Verdict::Pass)
}

fn write_reports<R: Report>(report: &R, dir: &Path, json_name: &str, md_name: &str) -> Result<(), BqcCliError> {
    let json_path = dir.join(json_name);
    let md_path = dir.join(md_name);
    write_report_pair(report, &json_path, &md_path)?;
    println!("Wrote {}", json_path.display());
    println!("Wrote {}", md_path.display());
    Ok(())
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

// Error types

#[derive(Debug)]
enum BqcCliError {
    Qc(QcError),
    Json(serde_json::Error),
    VerdictFail,
}

impl From<QcError> for BqcCliError {
    fn from(e: QcError) -> Self {
        BqcCliError::Qc(e)
    }
}

impl From<serde_json::Error> for BqcCliError {
    fn from(e: serde_json::Error) -> Self {
        BqcCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BqcCliError> for CliError {
    fn from(e: BqcCliError) -> Self {
        match e {
            BqcCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            BqcCliError::VerdictFail => CliError {
                code: "VERDICT_FAIL".to_string(),
                message: "Verdict is FAIL".to_string(),
                hint: Some("See the written reports for fail reasons".to_string()),
            },
            BqcCliError::Qc(e) => {
                let (code, hint) = match &e {
                    QcError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
                    QcError::Csv(_) => ("CSV_ERROR", Some("Check that the input is well-formed CSV")),
                    QcError::JsonError(_) => ("JSON_ERROR", None),
                    QcError::MissingSchemaColumns { .. } | QcError::SchemaVersionMismatch { .. } => (
                        "SCHEMA_ERROR",
                        Some("Run 'bqc validate' for a per-session report"),
                    ),
                    QcError::NoWindows => (
                        "NO_WINDOWS",
                        Some("Check --raw-sessions-dir points at the session folders"),
                    ),
                    QcError::ColumnarUnavailable(_) | QcError::NoOutputWritten => (
                        "NO_OUTPUT",
                        Some("Rebuild with the 'parquet' feature or pass --write-csv"),
                    ),
                    _ => ("QC_ERROR", None),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}
