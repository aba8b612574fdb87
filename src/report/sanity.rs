use crate::coerce::{parse_integral, parse_numeric};
use crate::table::CsvTable;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Window boundaries of one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSpan {
    pub window_index: Option<i64>,
    pub window_start_ms: Option<f64>,
    pub window_end_ms: Option<f64>,
}

/// Distribution summary of a numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` below two values
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    fn from_values(column: &str, values: &[f64]) -> Self {
        let count = values.len();
        let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
        let std = match mean {
            Some(m) if count > 1 => {
                let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
                Some((ss / (count - 1) as f64).sqrt())
            }
            _ => None,
        };
        Self {
            column: column.to_string(),
            count,
            mean,
            std,
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
        }
    }
}

/// Column with its missing fraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissing {
    pub column: String,
    pub missing_frac: f64,
}

/// Quick look at a single window table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanityReport {
    pub source: String,
    pub rows: usize,
    pub columns: usize,
    pub windows: Vec<WindowSpan>,
    /// Rows per window index, ascending
    pub window_counts: BTreeMap<i64, usize>,
    /// Missing fraction per column, highest first
    pub missingness: Vec<ColumnMissing>,
    pub numeric_summary: Vec<NumericSummary>,
}

impl SanityReport {
    pub fn from_table(source: &str, table: &CsvTable) -> Self {
        let windows = (0..table.len())
            .map(|row| WindowSpan {
                window_index: parse_integral(table.cell(row, "windowIndex")),
                window_start_ms: parse_numeric(table.cell(row, "windowStartMs")),
                window_end_ms: parse_numeric(table.cell(row, "windowEndMs")),
            })
            .collect::<Vec<_>>();

        let mut window_counts = BTreeMap::new();
        for index in windows.iter().filter_map(|w| w.window_index) {
            *window_counts.entry(index).or_insert(0) += 1;
        }

        let mut missingness: Vec<ColumnMissing> = table
            .headers()
            .iter()
            .map(|name| {
                let cells = table.column(name).unwrap_or_default();
                let missing_frac = if cells.is_empty() {
                    0.0
                } else {
                    cells.iter().filter(|c| c.is_none()).count() as f64 / cells.len() as f64
                };
                ColumnMissing {
                    column: name.clone(),
                    missing_frac,
                }
            })
            .collect();
        missingness.sort_by(|a, b| b.missing_frac.total_cmp(&a.missing_frac));

        let numeric_summary = table
            .headers()
            .iter()
            .filter_map(|name| {
                let cells = table.column(name)?;
                let values = cells
                    .iter()
                    .flatten()
                    .map(|c| parse_numeric(Some(*c)))
                    .collect::<Option<Vec<f64>>>()?;
                Some(NumericSummary::from_values(name, &values))
            })
            .collect();

        Self {
            source: source.to_string(),
            rows: table.len(),
            columns: table.headers().len(),
            windows,
            window_counts,
            missingness,
            numeric_summary,
        }
    }

    /// Plain-text rendering for terminals
    pub fn render_text(&self) -> String {
        let fmt_opt = |v: Option<f64>| v.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
        let mut out = String::new();

        let _ = writeln!(out, "=== BASIC SHAPE ===");
        let _ = writeln!(out, "({}, {})", self.rows, self.columns);

        let _ = writeln!(out, "\n=== WINDOW STRUCTURE ===");
        let _ = writeln!(out, "windowIndex\twindowStartMs\twindowEndMs");
        for w in &self.windows {
            let index = w.window_index.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{}\t{}\t{}",
                index,
                w.window_start_ms.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                w.window_end_ms.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
            );
        }

        let _ = writeln!(out, "\n=== WINDOW COUNT ===");
        for (index, count) in &self.window_counts {
            let _ = writeln!(out, "{}\t{}", index, count);
        }

        let _ = writeln!(out, "\n=== MISSINGNESS (fraction) ===");
        for m in &self.missingness {
            let _ = writeln!(out, "{}\t{:.3}", m.column, m.missing_frac);
        }

        let _ = writeln!(out, "\n=== NUMERIC FEATURE SUMMARY ===");
        let _ = writeln!(out, "column\tcount\tmean\tstd\tmin\tmax");
        for s in &self.numeric_summary {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                s.column,
                s.count,
                fmt_opt(s.mean),
                fmt_opt(s.std),
                fmt_opt(s.min),
                fmt_opt(s.max)
            );
        }

        out
    }
}
