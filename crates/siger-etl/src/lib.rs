//! SIGER Extract Pipeline Library
//!
//! Profiles, cleans and persists the pipe-delimited Latin-1 extracts of the
//! SIGER legacy database, built on Polars.
//!
//! # Overview
//!
//! - **Reading**: `<files_root>/<TABLE>.csv`, `|`-separated, ISO-8859-1
//! - **Profiling**: primary key integrity, null report, date ranges, categorical frequencies
//! - **Cleaning**: quarantine of sentinel-dated and soft-deleted rows, typed timestamp columns
//! - **Loading**: a Parquet copy and a relational copy of every cleaned table
//! - **Summary**: a master quality summary across all past quality reports
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use siger_etl::{DualSinkWriter, EtlConfig, TablePipeline};
//!
//! let config = EtlConfig::from_file("config/etl.toml")?;
//! let pipeline = TablePipeline::new(&config);
//! let mut writer = DualSinkWriter::from_config(&config);
//!
//! let report = pipeline.run(&mut writer, "MVSOLICITUDES", None)?;
//! if let Some(profile) = report.profile.profile() {
//!     println!("{}", profile.render());
//! }
//! println!("Anomalies quarantined: {}", report.cleaning.anomaly_rows());
//! ```
//!
//! # Artifacts
//!
//! | Artifact | Location |
//! |----------|----------|
//! | Quality report | `<reports_dir>/<TABLE>_EDA_Report_<ts>.csv` |
//! | Anomaly log | `<logs_dir>/<TABLE>_anomalies_<ts>.csv` |
//! | Master summary | `<reports_dir>/MASTER_QUALITY_SUMMARY_<ts>.csv` |
//! | Columnar copy | `<clean_data_dir>/<TABLE>.parquet` |

pub mod cleaner;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod profiler;
pub mod reader;
pub mod reporting;
pub mod sink;
pub mod summary;
pub mod types;
pub mod utils;

pub use cleaner::{AnomalyCleaner, CleaningOutcome};
pub use config::{CleaningRules, EtlConfig, EtlConfigBuilder, ProfileRules, TableRules};
pub use error::{EtlError, Result, ResultExt};
pub use pipeline::{EtlStage, TablePipeline};
pub use profiler::DataProfiler;
pub use reader::{ReadOptions, TableReader};
pub use sink::{DualSinkWriter, ParquetSink, RelationalSink, SqliteSink};
pub use summary::{SummaryAggregator, SummaryOutcome};
pub use types::*;
