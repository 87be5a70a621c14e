//! Shared helpers used across the profiler, cleaner and aggregator.

use chrono::Local;
use polars::prelude::*;
use std::path::{Path, PathBuf};

// =============================================================================
// Numeric helpers
// =============================================================================

/// Round to 2 decimal places.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total * 100` rounded to 2 decimals, or 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

// =============================================================================
// Column helpers
// =============================================================================

/// Label for a column's dtype as recorded in quality reports (`String`, `Int64`, ...).
pub fn dtype_label(dtype: &DataType) -> String {
    format!("{:?}", dtype)
}

/// Fetch a column as a materialized series, mapping absence to `ColumnNotFound`.
pub fn require_series<'a>(df: &'a DataFrame, name: &str) -> crate::error::Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| crate::error::EtlError::ColumnNotFound(name.to_string()))
}

/// Whether a table has a column with this name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Collect a column's values as optional strings, casting non-text dtypes first.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let as_text = series.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

// =============================================================================
// Encoding
// =============================================================================

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// =============================================================================
// Artifact naming
// =============================================================================

/// Timestamp suffix used in artifact names.
pub fn artifact_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `<dir>/<stem>.<ext>`, or `<dir>/<stem>_<n>.<ext>` if that file already exists.
///
/// Artifacts are append-only: two runs within the same second never overwrite
/// each other.
pub fn unique_artifact_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
