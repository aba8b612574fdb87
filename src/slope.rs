//! Fatigue slope estimation
//!
//! A session's fatigue trend is the ordinary-least-squares slope of a
//! behavioural metric against the window index.

use crate::config::SlopeConfig;
use crate::table::CsvTable;
use serde::{Deserialize, Serialize};

/// Relative tolerance when deciding that all index values are identical
const INDEX_RTOL: f64 = 1e-5;

/// Absolute tolerance when deciding that all index values are identical
const INDEX_ATOL: f64 = 1e-8;

/// Fit an OLS slope of `y` against `x`
///
/// Pairs where either value is non-finite are dropped. Returns `None` with
/// fewer than two usable points, when every `x` is (numerically) the same,
/// or when the variance of `x` is not positive. Otherwise the slope is the
/// population covariance of `x` and `y` over the population variance of `x`.
pub fn fit_slope(x: &[f64], y: &[f64]) -> Option<f64> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();

    if points.len() < 2 {
        return None;
    }

    let first = points[0].0;
    if points
        .iter()
        .all(|(a, _)| (a - first).abs() <= INDEX_ATOL + INDEX_RTOL * first.abs())
    {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, b)| b).sum::<f64>() / n;

    let var_x = points.iter().map(|(a, _)| (a - mean_x).powi(2)).sum::<f64>() / n;
    if var_x <= 0.0 {
        return None;
    }

    let cov_xy = points
        .iter()
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum::<f64>()
        / n;

    Some(cov_xy / var_x)
}

/// Typing and tapping fatigue slopes of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSlopes {
    pub typing: Option<f64>,
    pub tapping: Option<f64>,
}

/// Compute both fatigue slopes of a session's window table
///
/// The typing metric is the first present column of the configured chain;
/// a slope is `None` when no metric column exists.
pub fn session_slopes(table: &CsvTable, config: &SlopeConfig) -> SessionSlopes {
    let x = numeric_or_nan(table, &config.index_column);

    let slope_for = |column: Option<&str>| {
        let column = column?;
        let x = x.as_ref()?;
        let y = numeric_or_nan(table, column)?;
        fit_slope(x, &y)
    };

    SessionSlopes {
        typing: slope_for(config.typing_metric.resolve(|c| table.has_column(c))),
        tapping: slope_for(config.tapping_metric.resolve(|c| table.has_column(c))),
    }
}

fn numeric_or_nan(table: &CsvTable, column: &str) -> Option<Vec<f64>> {
    table
        .numeric_column(column)
        .map(|values| values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> CsvTable {
        CsvTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_unit_slope() {
        let slope = fit_slope(&[0.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((slope - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_slope() {
        let slope = fit_slope(&[0.0, 1.0, 2.0], &[10.0, 8.0, 6.0]).unwrap();
        assert!((slope + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        assert_eq!(fit_slope(&[], &[]), None);
        assert_eq!(fit_slope(&[1.0], &[2.0]), None);
        assert_eq!(fit_slope(&[1.0, 2.0], &[2.0, f64::NAN]), None);
    }

    #[test]
    fn test_constant_index() {
        assert_eq!(fit_slope(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(fit_slope(&[0.0, 1e-12], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_non_finite_pairs_dropped() {
        let slope = fit_slope(
            &[0.0, 1.0, f64::NAN, 2.0, 3.0],
            &[1.0, 3.0, 100.0, f64::INFINITY, 7.0],
        )
        .unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_session_slopes_prefers_global_mean() {
        let t = table(
            "windowIndex,typing_ikt_global_mean,ikt_mean,tap_rt_mean\n\
             0,100,5,400\n\
             1,110,4,390\n\
             2,120,3,380\n",
        );
        let slopes = session_slopes(&t, &SlopeConfig::default());
        assert!((slopes.typing.unwrap() - 10.0).abs() < 1e-9);
        assert!((slopes.tapping.unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_slopes_legacy_column() {
        let t = table("windowIndex,ikt_mean\n0,5\n1,4\n2,3\n");
        let slopes = session_slopes(&t, &SlopeConfig::default());
        assert!((slopes.typing.unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(slopes.tapping, None);
    }

    #[test]
    fn test_session_slopes_without_index() {
        let t = table("tap_rt_mean\n1\n2\n");
        assert_eq!(session_slopes(&t, &SlopeConfig::default()), SessionSlopes::default());
    }
}
