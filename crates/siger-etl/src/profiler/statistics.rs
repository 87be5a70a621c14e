//! Per-column statistics: key integrity, null counts and value frequencies.

use crate::error::Result;
use crate::types::{CategoricalProfile, ColumnQualityRecord, PrimaryKeyCheck, ValueCount};
use crate::utils::{dtype_label, percentage, require_series, string_values};
use polars::prelude::*;
use std::collections::HashMap;

/// Number of values kept in a categorical breakdown.
pub const TOP_VALUES: usize = 10;

/// Check that `column` behaves as a primary key.
///
/// Nulls count as one distinct value, so a key with one duplicate and one
/// null reports `duplicate_count == 1` and `null_count == 1`.
pub(crate) fn check_primary_key(df: &DataFrame, column: &str) -> Result<PrimaryKeyCheck> {
    let series = require_series(df, column)?;
    let total_rows = series.len();
    let unique_count = series.n_unique()?;
    let null_count = series.null_count();

    let distinct_non_null = unique_count - usize::from(null_count > 0);
    let is_valid = distinct_non_null == total_rows && null_count == 0;

    Ok(PrimaryKeyCheck {
        column: column.to_string(),
        total_rows,
        unique_count,
        null_count,
        duplicate_count: total_rows - unique_count,
        is_valid,
    })
}

/// One record per column, sorted by null count descending.
///
/// Columns with equal null counts keep their table order.
pub(crate) fn null_report(df: &DataFrame) -> Vec<ColumnQualityRecord> {
    let total_rows = df.height();
    let mut records: Vec<ColumnQualityRecord> = df
        .get_columns()
        .iter()
        .map(|col| ColumnQualityRecord {
            column: col.name().to_string(),
            dtype: dtype_label(col.dtype()),
            null_count: col.null_count(),
            null_percentage: percentage(col.null_count(), total_rows),
        })
        .collect();

    records.sort_by(|a, b| b.null_count.cmp(&a.null_count));
    records
}

/// Most frequent non-null values of a column plus its null count.
pub(crate) fn analyze_categorical(series: &Series) -> Result<CategoricalProfile> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut null_count = 0;
    for value in string_values(series)? {
        match value {
            Some(v) => *counts.entry(v).or_insert(0) += 1,
            None => null_count += 1,
        }
    }

    let mut top_values: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    top_values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    top_values.truncate(TOP_VALUES);

    Ok(CategoricalProfile {
        column: series.name().to_string(),
        top_values,
        null_count,
    })
}
