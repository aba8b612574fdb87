//! Typed field parsing
//!
//! Session exports are loosely typed text: booleans arrive as `1`/`true`/`yes`
//! in any case, numbers may be blank or `NaN`, and timestamps may or may not
//! carry an offset. Every column read in this crate goes through one of the
//! parsers here so that the same cell is interpreted identically by the
//! validator, the presence estimator and the dataset builder.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Cell texts that are read as missing values
pub const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Tokens read as `true` (compared after trimming and lowercasing)
pub const TRUE_TOKENS: &[&str] = &["1", "true", "t", "yes", "y"];

/// Tokens read as `false` (compared after trimming and lowercasing)
pub const FALSE_TOKENS: &[&str] = &["0", "false", "f", "no", "n"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Whether a raw cell text denotes a missing value
pub fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw)
}

/// Parse a boolean token; `None` for missing or unrecognized values
pub fn parse_bool_token(raw: Option<&str>) -> Option<bool> {
    let token = raw?.trim().to_ascii_lowercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Whether a value is one of the recognized boolean tokens
pub fn is_bool_token(raw: Option<&str>) -> bool {
    parse_bool_token(raw).is_some()
}

/// Map a cell to a presence flag; missing and unrecognized values are `false`
pub fn is_truthy(raw: Option<&str>) -> bool {
    parse_bool_token(raw).unwrap_or(false)
}

/// Parse a numeric cell; missing, non-numeric and NaN values yield `None`
///
/// Infinite values are kept so that callers can decide whether they are
/// usable (the slope estimator drops them, the validator accepts them).
pub fn parse_numeric(raw: Option<&str>) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// Parse a cell as an integer; non-integral values yield `None`
pub fn parse_integral(raw: Option<&str>) -> Option<i64> {
    let trimmed = raw?.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = parse_numeric(Some(trimmed))?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Parse an ISO-8601 timestamp into UTC
///
/// Accepts RFC 3339, offset-qualified timestamps without a colon in the
/// offset, naive date-times (interpreted as UTC) and bare dates.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_tokens_case_and_whitespace_insensitive() {
        assert_eq!(parse_bool_token(Some(" TRUE ")), Some(true));
        assert_eq!(parse_bool_token(Some("Yes")), Some(true));
        assert_eq!(parse_bool_token(Some("y")), Some(true));
        assert_eq!(parse_bool_token(Some("1")), Some(true));
        assert_eq!(parse_bool_token(Some("F")), Some(false));
        assert_eq!(parse_bool_token(Some("no")), Some(false));
        assert_eq!(parse_bool_token(Some("0")), Some(false));
        assert_eq!(parse_bool_token(Some("bogus")), None);
        assert_eq!(parse_bool_token(Some("1.0")), None);
        assert_eq!(parse_bool_token(None), None);
    }

    #[test]
    fn test_truthy_mapping() {
        let mapped: Vec<bool> = ["true", "0", "yes", "bogus"]
            .iter()
            .map(|v| is_truthy(Some(v)))
            .collect();
        assert_eq!(mapped, vec![true, false, true, false]);
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric(Some("42")), Some(42.0));
        assert_eq!(parse_numeric(Some(" -1.5 ")), Some(-1.5));
        assert_eq!(parse_numeric(Some("1e3")), Some(1000.0));
        assert_eq!(parse_numeric(Some("NaN")), None);
        assert_eq!(parse_numeric(Some("abc")), None);
        assert_eq!(parse_numeric(None), None);
        assert_eq!(parse_numeric(Some("inf")), Some(f64::INFINITY));
    }

    #[test]
    fn test_parse_integral() {
        assert_eq!(parse_integral(Some("7")), Some(7));
        assert_eq!(parse_integral(Some("2.0")), Some(2));
        assert_eq!(parse_integral(Some("2.5")), None);
        assert_eq!(parse_integral(Some("inf")), None);
        assert_eq!(parse_integral(Some("x")), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp(Some("2024-01-15T14:00:00Z")).is_some());
        assert!(parse_timestamp(Some("2024-01-15T14:00:00.123+02:00")).is_some());
        assert!(parse_timestamp(Some("2024-01-15T14:00:00.123+0200")).is_some());
        assert!(parse_timestamp(Some("2024-01-15 14:00:00")).is_some());
        assert!(parse_timestamp(Some("2024-01-15")).is_some());
        assert!(parse_timestamp(Some("yesterday")).is_none());
        assert!(parse_timestamp(None).is_none());
    }

    #[test]
    fn test_parse_timestamp_normalizes_to_utc() {
        let ts = parse_timestamp(Some("2024-01-15T16:00:00+02:00")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T14:00:00+00:00");
    }

    #[test]
    fn test_null_tokens() {
        assert!(is_null_token(""));
        assert!(is_null_token("NaN"));
        assert!(is_null_token("NULL"));
        assert!(!is_null_token("0"));
        assert!(!is_null_token(" "));
    }
}
