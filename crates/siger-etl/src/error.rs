//! Error types for the SIGER extract pipeline.
//!
//! The taxonomy mirrors how failures propagate: configuration and structural
//! errors abort a run (or a table), while row-level parse failures and
//! file-level aggregation failures are absorbed by their callers and never
//! reach this type.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the extract pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Missing or malformed configuration file, section or key.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The delimited source file for a table does not exist.
    #[error("No source file for table '{table}' in {}", .root.display())]
    SourceNotFound { table: String, root: PathBuf },

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// A column could not be converted as a whole (strict parsing).
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// Structural failure while cleaning a table.
    #[error("Transformation failed for table '{table}': {reason}")]
    TransformationFailed { table: String, reason: String },

    /// A sink could not persist a table.
    #[error("{sink} sink failed for table '{table}': {reason}")]
    SinkFailed {
        sink: &'static str,
        table: String,
        reason: String,
    },

    /// No quality report could be aggregated.
    #[error("No quality report data found in {}", .0.display())]
    NoReportData(PathBuf),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error.
    #[error("Configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Relational sink error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Toml(_) => "CONFIG_ERROR",
            Self::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::TransformationFailed { .. } => "TRANSFORMATION_FAILED",
            Self::SinkFailed { .. } => "SINK_FAILED",
            Self::NoReportData(_) => "NO_REPORT_DATA",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Configuration errors stop the process before any table is touched.
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) | Self::Toml(_) => true,
            Self::WithContext { source, .. } => source.is_config(),
            _ => false,
        }
    }

    /// Whether this error terminates the pipeline for the current table.
    ///
    /// Sink failures are reported per sink and the aggregator's "no data"
    /// result is an outcome, not a crash; everything else is fatal.
    pub fn is_table_fatal(&self) -> bool {
        match self {
            Self::SinkFailed { .. } | Self::NoReportData(_) => false,
            Self::WithContext { source, .. } => source.is_table_fatal(),
            _ => true,
        }
    }
}

/// Errors are serialized as `{ code, message }` for `--json` output.
impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}
