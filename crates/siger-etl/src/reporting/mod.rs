//! Artifact writers.
//!
//! Every artifact is a `|`-separated file named after its table and the time
//! it was produced. Existing artifacts are never overwritten; see
//! [`crate::utils::unique_artifact_path`].
//!
//! - Quality reports: `<TABLE>_EDA_Report_<ts>.csv`, one row per column with
//!   `Columna|Tipo_Dato|Nulos|Porcentaje_Nulos`. These are the input of the
//!   [`crate::summary::SummaryAggregator`].
//! - Anomaly logs: `<TABLE>_anomalies_<ts>.csv`, the quarantined rows with
//!   their `Tipo_Anomalia` label.

mod artifacts;

pub use artifacts::{
    ANOMALY_LOG_MARKER, QUALITY_REPORT_MARKER, REPORT_SEPARATOR, write_anomaly_log,
    write_quality_report,
};
