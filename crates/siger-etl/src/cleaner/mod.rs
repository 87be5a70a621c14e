//! Anomaly detection and cleaning.
//!
//! Splits a table into a cleaned table and a quarantined anomaly table:
//!
//! 1. Each designated temporal column is parsed leniently into `<col>_DT`.
//! 2. A row is quarantined when any parsed year is a sentinel (4, 9998) or
//!    when its status column holds the soft-delete marker.
//! 3. Retained rows have sentinel timestamps nulled (see
//!    [`null_sentinel_timestamps`]), raw temporal columns and legacy
//!    always-null columns dropped, and the derived columns appended.
//!
//! Every input row ends up in exactly one of the two outputs.

mod converters;

pub use converters::TIMESTAMP_FORMAT;
pub(crate) use converters::{is_sentinel, parse_timestamps_strict};

use crate::config::CleaningRules;
use crate::error::{EtlError, Result, ResultExt};
use crate::types::{AnomalyKind, CleaningSummary};
use crate::utils::{has_column, require_series, string_values};
use chrono::NaiveDateTime;
use converters::{parse_timestamps_lenient, timestamps_to_series};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Suffix of the derived timestamp columns.
pub const DERIVED_SUFFIX: &str = "_DT";

/// Output of one cleaning pass.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub cleaned: DataFrame,
    /// Original columns of quarantined rows plus [`AnomalyKind::LABEL_COLUMN`].
    pub anomalies: DataFrame,
    pub summary: CleaningSummary,
}

/// Per-row classification of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct RowClassification {
    pub kinds: Vec<Option<AnomalyKind>>,
}

impl RowClassification {
    fn count(&self, kind: AnomalyKind) -> usize {
        self.kinds.iter().filter(|k| **k == Some(kind)).count()
    }

    fn retained_mask(&self) -> BooleanChunked {
        let keep: Vec<bool> = self.kinds.iter().map(Option::is_none).collect();
        BooleanChunked::from_slice("retained".into(), &keep)
    }

    fn anomaly_mask(&self) -> BooleanChunked {
        let quarantine: Vec<bool> = self.kinds.iter().map(Option::is_some).collect();
        BooleanChunked::from_slice("anomalous".into(), &quarantine)
    }
}

/// Detects and quarantines anomalous rows.
pub struct AnomalyCleaner {
    rules: CleaningRules,
}

impl AnomalyCleaner {
    pub fn new(rules: CleaningRules) -> Self {
        Self { rules }
    }

    /// Split `df` into cleaned and anomaly tables.
    ///
    /// Fails with [`EtlError::ColumnNotFound`] (wrapped with the table name) if a
    /// designated column is missing; no partial output is produced.
    pub fn clean(&self, table: &str, df: &DataFrame) -> Result<CleaningOutcome> {
        self.validate_structure(df)
            .context(format!("Cleaning table '{}'", table))?;

        let rows = df.height();
        let mut derived: Vec<(String, Vec<Option<NaiveDateTime>>)> = Vec::new();
        let mut unparsed_values = 0;
        for col in &self.rules.temporal_columns {
            let parsed = parse_timestamps_lenient(require_series(df, col)?)?;
            if parsed.failures > 0 {
                warn!(
                    "{}: {} values in '{}' did not parse as timestamps and were set to null",
                    table, parsed.failures, col
                );
            }
            unparsed_values += parsed.failures;
            derived.push((format!("{}{}", col, DERIVED_SUFFIX), parsed.values));
        }

        let classification = self.classify_rows(df, &derived)?;

        let anomalies = self
            .build_anomaly_table(df, &classification)
            .map_err(|e| transformation_error(table, e))?;
        let (cleaned, sentinels_nulled) = self
            .build_cleaned_table(df, derived, &classification)
            .map_err(|e| transformation_error(table, e))?;

        let summary = CleaningSummary {
            rows_before: rows,
            rows_cleaned: cleaned.height(),
            date_sentinel_rows: classification.count(AnomalyKind::DateSentinel),
            soft_delete_rows: classification.count(AnomalyKind::SoftDelete),
            unparsed_values,
            sentinels_nulled,
            dropped_columns: self.dropped_columns(),
        };

        info!(
            "Transformations applied to {}. Rows: {}, Columns: {} ({} anomalies quarantined)",
            table,
            cleaned.height(),
            cleaned.width(),
            summary.anomaly_rows()
        );

        Ok(CleaningOutcome {
            cleaned,
            anomalies,
            summary,
        })
    }

    fn validate_structure(&self, df: &DataFrame) -> Result<()> {
        let required = self
            .rules
            .temporal_columns
            .iter()
            .chain(std::iter::once(&self.rules.status_column))
            .chain(self.rules.drop_columns.iter());

        for col in required {
            if !has_column(df, col) {
                return Err(EtlError::ColumnNotFound(col.clone()));
            }
        }
        Ok(())
    }

    /// Classify each row from the parsed temporal columns and the status column.
    pub fn classify_rows(
        &self,
        df: &DataFrame,
        derived: &[(String, Vec<Option<NaiveDateTime>>)],
    ) -> Result<RowClassification> {
        let status = string_values(require_series(df, &self.rules.status_column)?)?;
        let sentinel_years = &self.rules.sentinel_years;

        let kinds = (0..df.height())
            .map(|row| {
                let date_sentinel = derived
                    .iter()
                    .any(|(_, values)| is_sentinel(values[row], sentinel_years));
                let soft_delete =
                    status[row].as_deref() == Some(self.rules.soft_delete_marker.as_str());
                AnomalyKind::classify(date_sentinel, soft_delete)
            })
            .collect();

        Ok(RowClassification { kinds })
    }

    fn build_anomaly_table(
        &self,
        df: &DataFrame,
        classification: &RowClassification,
    ) -> Result<DataFrame> {
        let quarantined = df.filter(&classification.anomaly_mask())?;
        let labels: Vec<&str> = classification
            .kinds
            .iter()
            .flatten()
            .map(AnomalyKind::label)
            .collect();
        let label_column = Series::new(AnomalyKind::LABEL_COLUMN.into(), labels);
        Ok(quarantined.hstack(&[label_column.into()])?)
    }

    fn build_cleaned_table(
        &self,
        df: &DataFrame,
        derived: Vec<(String, Vec<Option<NaiveDateTime>>)>,
        classification: &RowClassification,
    ) -> Result<(DataFrame, usize)> {
        let retained = classification.retained_mask();
        let kept = df.filter(&retained)?;

        let mut sentinels_nulled = 0;
        let mut derived_columns: Vec<Column> = Vec::with_capacity(derived.len());
        for (name, values) in derived {
            let retained_values: Vec<Option<NaiveDateTime>> = values
                .into_iter()
                .zip(classification.kinds.iter())
                .filter(|(_, kind)| kind.is_none())
                .map(|(value, _)| value)
                .collect();
            let (checked, nulled) =
                null_sentinel_timestamps(retained_values, &self.rules.sentinel_years);
            sentinels_nulled += nulled;
            derived_columns.push(timestamps_to_series(&name, &checked)?.into());
        }
        if sentinels_nulled > 0 {
            debug!("Nulled {} sentinel timestamps on retained rows", sentinels_nulled);
        }

        let to_drop: Vec<PlSmallStr> = self
            .dropped_columns()
            .iter()
            .map(|s| s.as_str().into())
            .collect();
        let cleaned = kept.drop_many(to_drop).hstack(&derived_columns)?;

        Ok((cleaned, sentinels_nulled))
    }

    fn dropped_columns(&self) -> Vec<String> {
        self.rules
            .drop_columns
            .iter()
            .chain(self.rules.temporal_columns.iter())
            .cloned()
            .collect()
    }
}

/// Null any sentinel-year value among retained rows.
///
/// Rows with a sentinel timestamp are quarantined as a whole, so the count is
/// 0 unless a sentinel reached the retained rows. Returns the values and how
/// many were nulled.
pub fn null_sentinel_timestamps(
    values: Vec<Option<NaiveDateTime>>,
    sentinel_years: &[i32],
) -> (Vec<Option<NaiveDateTime>>, usize) {
    let mut nulled = 0;
    let checked = values
        .into_iter()
        .map(|value| {
            if is_sentinel(value, sentinel_years) {
                nulled += 1;
                None
            } else {
                value
            }
        })
        .collect();
    (checked, nulled)
}

fn transformation_error(table: &str, source: EtlError) -> EtlError {
    EtlError::TransformationFailed {
        table: table.to_string(),
        reason: source.to_string(),
    }
}
