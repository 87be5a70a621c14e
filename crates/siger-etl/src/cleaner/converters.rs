//! Timestamp conversion for the legacy text date columns.

use crate::error::{EtlError, Result};
use crate::utils::string_values;
use chrono::{Datelike, NaiveDateTime};
use polars::prelude::*;

/// Format of every SIGER timestamp, e.g. `2023-04-11 09:15:00.000`.
/// The fractional part is optional.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse one raw value. Blank values are treated as missing.
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT).ok()
}

/// Parsed values of a column where unparseable values become `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LenientParse {
    pub values: Vec<Option<NaiveDateTime>>,
    /// Non-blank values that did not match [`TIMESTAMP_FORMAT`].
    pub failures: usize,
}

/// Parse a column without failing on bad values.
pub(crate) fn parse_timestamps_lenient(series: &Series) -> Result<LenientParse> {
    let mut parsed = LenientParse::default();
    for raw in string_values(series)? {
        let value = raw.as_deref().and_then(parse_timestamp);
        if value.is_none() && raw.as_deref().is_some_and(|r| !r.trim().is_empty()) {
            parsed.failures += 1;
        }
        parsed.values.push(value);
    }
    Ok(parsed)
}

/// Parse a column, failing on the first non-blank value that does not match.
pub(crate) fn parse_timestamps_strict(series: &Series) -> Result<Vec<Option<NaiveDateTime>>> {
    string_values(series)?
        .into_iter()
        .map(|raw| match raw {
            None => Ok(None),
            Some(r) if r.trim().is_empty() => Ok(None),
            Some(r) => parse_timestamp(&r)
                .map(Some)
                .ok_or_else(|| EtlError::TypeConversionFailed {
                    column: series.name().to_string(),
                    target_type: "Datetime".to_string(),
                    reason: format!("'{}' does not match {}", r, TIMESTAMP_FORMAT),
                }),
        })
        .collect()
}

/// Whether a parsed value falls on one of the placeholder years.
pub(crate) fn is_sentinel(value: Option<NaiveDateTime>, sentinel_years: &[i32]) -> bool {
    value.is_some_and(|ts| sentinel_years.contains(&ts.year()))
}

/// Build a millisecond `Datetime` series from parsed values.
pub(crate) fn timestamps_to_series(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Series> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|ts| ts.and_utc().timestamp_millis()))
        .collect();
    let series = Series::new(name.into(), millis);
    Ok(series.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}
