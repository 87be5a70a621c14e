//! Data quality profiling.
//!
//! A profile is a read-only pass over one table:
//! - Primary key integrity (distinct, null and duplicate counts)
//! - Null counts and percentages for every column
//! - Date range and future-date checks on the temporal columns
//! - Frequency breakdown of one categorical column

mod statistics;
mod temporal;

pub use statistics::TOP_VALUES;

use crate::config::ProfileRules;
use crate::error::{Result, ResultExt};
use crate::types::{TableProfile, TemporalAnalysis, TemporalColumnStats};
use crate::utils::{has_column, require_series};
use polars::prelude::*;
use tracing::{info, warn};

pub(crate) use statistics::{analyze_categorical, check_primary_key, null_report};
pub(crate) use temporal::analyze_temporal;

/// Data profiler for SIGER tables.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile a table with the given rules.
    ///
    /// A missing primary key column is an error. Missing temporal columns are
    /// skipped and a missing categorical column is reported as absent.
    pub fn profile(table: &str, df: &DataFrame, rules: &ProfileRules) -> Result<TableProfile> {
        info!("Profiling {}: {} rows, {} columns", table, df.height(), df.width());

        let primary_key = check_primary_key(df, &rules.primary_key)
            .context(format!("Profiling table '{}'", table))?;
        if !primary_key.is_valid {
            warn!(
                "{}: '{}' is not a valid primary key ({} duplicates, {} nulls)",
                table, primary_key.column, primary_key.duplicate_count, primary_key.null_count
            );
        }

        let null_report = null_report(df);
        let temporal = analyze_temporal(df, &rules.temporal_columns, rules.future_threshold);

        let categorical = match &rules.categorical_column {
            Some(column) if has_column(df, column) => {
                Some(analyze_categorical(require_series(df, column)?)?)
            }
            Some(column) => {
                warn!("{}: categorical column '{}' not found, skipping", table, column);
                None
            }
            None => None,
        };

        Ok(TableProfile {
            table: table.to_string(),
            shape: (df.height(), df.width()),
            primary_key,
            null_report,
            temporal,
            categorical,
        })
    }
}

impl TableProfile {
    /// Human-readable report printed by the `profile` and `run` commands.
    pub fn render(&self) -> String {
        let mut out = format!("=== Data quality profile: {} ===\n", self.table);
        out.push_str(&format!("Rows: {}  Columns: {}\n", self.shape.0, self.shape.1));

        let pk = &self.primary_key;
        out.push_str(&format!("\n[Primary key] {}\n", pk.column));
        out.push_str(&format!(
            "  total: {}  unique: {}  nulls: {}  duplicates: {}  -> {}\n",
            pk.total_rows,
            pk.unique_count,
            pk.null_count,
            pk.duplicate_count,
            if pk.is_valid { "VALID" } else { "INVALID" }
        ));

        out.push_str("\n[Nulls]\n");
        out.push_str(&format!(
            "  {:<28} {:<14} {:>10} {:>8}\n",
            "column", "dtype", "nulls", "%"
        ));
        for record in &self.null_report {
            out.push_str(&format!(
                "  {:<28} {:<14} {:>10} {:>8.2}\n",
                record.column, record.dtype, record.null_count, record.null_percentage
            ));
        }

        out.push_str("\n[Temporal]\n");
        match &self.temporal {
            TemporalAnalysis::Completed { columns } if columns.is_empty() => {
                out.push_str("  no temporal columns present\n");
            }
            TemporalAnalysis::Completed { columns } => {
                for stats in columns {
                    out.push_str(&temporal_line(stats));
                }
            }
            TemporalAnalysis::Failed { completed, message } => {
                for stats in completed {
                    out.push_str(&temporal_line(stats));
                }
                out.push_str(&format!("  analysis failed: {}\n", message));
            }
        }

        if let Some(categorical) = &self.categorical {
            out.push_str(&format!(
                "\n[Top {} values] {} (nulls: {})\n",
                TOP_VALUES, categorical.column, categorical.null_count
            ));
            for entry in &categorical.top_values {
                out.push_str(&format!("  {:<20} {:>10}\n", entry.value, entry.count));
            }
        }

        out
    }
}

fn temporal_line(stats: &TemporalColumnStats) -> String {
    format!(
        "  {}: min {}  max {}  future: {}\n",
        stats.column,
        stats.min.map_or("-".to_string(), |ts| ts.to_string()),
        stats.max.map_or("-".to_string(), |ts| ts.to_string()),
        stats.future_count
    )
}
