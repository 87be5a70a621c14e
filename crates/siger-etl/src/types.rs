use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Null statistics for one column of one table, as written to the quality report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQualityRecord {
    pub column: String,
    /// Polars dtype label of the column as loaded (e.g. `String`, `Int64`).
    pub dtype: String,
    pub null_count: usize,
    /// `null_count / total_rows * 100`, rounded to 2 decimals; 0 for empty tables.
    pub null_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyCheck {
    pub column: String,
    pub total_rows: usize,
    /// Distinct values, with null counted as one value.
    pub unique_count: usize,
    pub null_count: usize,
    pub duplicate_count: usize,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalColumnStats {
    pub column: String,
    pub min: Option<NaiveDateTime>,
    pub max: Option<NaiveDateTime>,
    /// Values strictly after the configured future threshold.
    pub future_count: usize,
}

/// Outcome of the temporal step. A parse failure anywhere fails the whole step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TemporalAnalysis {
    Completed {
        columns: Vec<TemporalColumnStats>,
    },
    Failed {
        /// Columns analysed before the failing one.
        completed: Vec<TemporalColumnStats>,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalProfile {
    pub column: String,
    pub top_values: Vec<ValueCount>,
    pub null_count: usize,
}

/// Everything the profiler learns about one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    pub table: String,
    pub shape: (usize, usize),
    pub primary_key: PrimaryKeyCheck,
    /// Sorted by null count, descending.
    pub null_report: Vec<ColumnQualityRecord>,
    pub temporal: TemporalAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalProfile>,
}

/// Why a row was quarantined.
///
/// A row that matches both conditions is a [`AnomalyKind::SoftDelete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// A temporal column holds a placeholder year (4 or 9998).
    DateSentinel,
    /// The status column carries the soft-delete marker.
    SoftDelete,
}

impl AnomalyKind {
    /// Name of the label column appended to the anomaly table.
    pub const LABEL_COLUMN: &'static str = "Tipo_Anomalia";

    /// Classify a row from its two anomaly signals.
    pub fn classify(date_sentinel: bool, soft_delete: bool) -> Option<Self> {
        match (date_sentinel, soft_delete) {
            (_, true) => Some(Self::SoftDelete),
            (true, false) => Some(Self::DateSentinel),
            (false, false) => None,
        }
    }

    /// Label written to the anomaly log.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DateSentinel => "FECHA_EXTREMA",
            Self::SoftDelete => "DSNCI_BORRADO",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Counts describing one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub rows_before: usize,
    pub rows_cleaned: usize,
    pub date_sentinel_rows: usize,
    pub soft_delete_rows: usize,
    /// Non-null raw timestamps that failed lenient parsing and became null.
    pub unparsed_values: usize,
    /// Sentinel values nulled on retained rows (expected to stay 0).
    pub sentinels_nulled: usize,
    pub dropped_columns: Vec<String>,
}

impl CleaningSummary {
    pub fn anomaly_rows(&self) -> usize {
        self.date_sentinel_rows + self.soft_delete_rows
    }
}

/// One row of the cross-run master quality summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterSummaryRow {
    pub table: String,
    pub column: String,
    pub original_type: Option<String>,
    pub total_nulls: Option<i64>,
    /// Null percentage rescaled to 0.0 - 1.0, rounded to 2 decimals.
    pub null_ratio: Option<f64>,
}

/// Result of a sink write attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SinkOutcome {
    Written { target: String, rows: usize },
    Failed { error: String },
}

impl SinkOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Outcome of loading one cleaned table into both sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub table: String,
    pub columnar: SinkOutcome,
    pub relational: SinkOutcome,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.columnar.is_written() && self.relational.is_written()
    }
}

/// Result of the profiling pass of a table run.
///
/// Profiling is diagnostic only; a failure here never stops cleaning or loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ProfileOutcome {
    Profiled {
        profile: Box<TableProfile>,
        quality_report: PathBuf,
    },
    Failed {
        error: String,
    },
}

impl ProfileOutcome {
    pub fn profile(&self) -> Option<&TableProfile> {
        match self {
            Self::Profiled { profile, .. } => Some(profile.as_ref()),
            Self::Failed { .. } => None,
        }
    }

    pub fn quality_report(&self) -> Option<&PathBuf> {
        match self {
            Self::Profiled { quality_report, .. } => Some(quality_report),
            Self::Failed { .. } => None,
        }
    }
}

/// Everything a full table run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub table: String,
    pub profile: ProfileOutcome,
    pub cleaning: CleaningSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_log: Option<PathBuf>,
    pub load: LoadReport,
}
