//! Range and future-date checks on the text timestamp columns.

use crate::cleaner::parse_timestamps_strict;
use crate::error::Result;
use crate::types::{TemporalAnalysis, TemporalColumnStats};
use crate::utils::{has_column, require_series};
use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, warn};

/// Analyse each designated column present in `df`.
///
/// Any value that does not parse fails the whole step; the failure is
/// returned as [`TemporalAnalysis::Failed`] rather than an error so the rest
/// of the profile still runs. Columns analysed before the failure are kept.
pub(crate) fn analyze_temporal(
    df: &DataFrame,
    columns: &[String],
    future_threshold: NaiveDateTime,
) -> TemporalAnalysis {
    let mut completed = Vec::new();
    for column in columns {
        if !has_column(df, column) {
            debug!("Skipping temporal column '{}': not in table", column);
            continue;
        }

        match column_stats(df, column, future_threshold) {
            Ok(stats) => completed.push(stats),
            Err(e) => {
                warn!("Temporal analysis failed: {}", e);
                return TemporalAnalysis::Failed {
                    completed,
                    message: e.to_string(),
                };
            }
        }
    }
    TemporalAnalysis::Completed { columns: completed }
}

fn column_stats(
    df: &DataFrame,
    column: &str,
    future_threshold: NaiveDateTime,
) -> Result<TemporalColumnStats> {
    let values = parse_timestamps_strict(require_series(df, column)?)?;
    let present: Vec<NaiveDateTime> = values.into_iter().flatten().collect();

    Ok(TemporalColumnStats {
        column: column.to_string(),
        min: present.iter().min().copied(),
        max: present.iter().max().copied(),
        future_count: present.iter().filter(|ts| **ts > future_threshold).count(),
    })
}
