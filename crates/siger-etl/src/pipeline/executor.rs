use super::EtlStage;
use crate::cleaner::{AnomalyCleaner, CleaningOutcome};
use crate::config::EtlConfig;
use crate::error::{Result, ResultExt};
use crate::profiler::DataProfiler;
use crate::reader::{ReadOptions, TableReader};
use crate::reporting::{write_anomaly_log, write_quality_report};
use crate::sink::DualSinkWriter;
use crate::types::{LoadReport, ProfileOutcome, RunReport, TableProfile};
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Runs the per-table stages against one configuration.
///
/// Tables are processed one at a time; every stage reads the rules for the
/// table from [`EtlConfig::rules_for`].
pub struct TablePipeline<'a> {
    config: &'a EtlConfig,
}

impl<'a> TablePipeline<'a> {
    pub fn new(config: &'a EtlConfig) -> Self {
        Self { config }
    }

    /// Read a table's raw extract.
    pub fn extract(&self, table: &str, limit: Option<usize>) -> Result<DataFrame> {
        log_stage(table, EtlStage::Extracting);
        let reader = TableReader::new(
            &self.config.source_paths.files_root,
            ReadOptions::default().with_limit(limit),
        );
        reader.read_table(table)
    }

    /// Profile a table without writing anything.
    pub fn profile(&self, table: &str, df: &DataFrame) -> Result<TableProfile> {
        log_stage(table, EtlStage::Profiling);
        let rules = self.config.rules_for(table);
        DataProfiler::profile(table, df, &rules.profile)
    }

    /// Persist the null report of a profile.
    pub fn write_profile(&self, profile: &TableProfile) -> Result<PathBuf> {
        write_quality_report(
            &self.config.output.reports_dir,
            &profile.table,
            &profile.null_report,
        )
    }

    /// Split a table into cleaned rows and anomalies without writing anything.
    pub fn transform(&self, table: &str, df: &DataFrame) -> Result<CleaningOutcome> {
        log_stage(table, EtlStage::Cleaning);
        let rules = self.config.rules_for(table);
        AnomalyCleaner::new(rules.cleaning).clean(table, df)
    }

    /// Persist the anomaly log of a cleaning pass, if there are anomalies.
    pub fn write_anomalies(&self, table: &str, outcome: &CleaningOutcome) -> Result<Option<PathBuf>> {
        write_anomaly_log(&self.config.output.logs_dir, table, &outcome.anomalies)
    }

    /// Write a cleaned table to both sinks.
    pub fn load(&self, writer: &mut DualSinkWriter, table: &str, cleaned: &DataFrame) -> LoadReport {
        log_stage(table, EtlStage::Loading);
        writer.write(table, cleaned)
    }

    /// Extract, profile, clean, report and load one table.
    ///
    /// Profiling and cleaning both finish before any artifact is written, so a
    /// structural cleaning failure leaves nothing behind for the table. A
    /// profiling failure is recorded in [`RunReport::profile`] and skips only
    /// the quality report. Sink failures do not fail the run either; they are
    /// recorded in [`RunReport::load`].
    pub fn run(
        &self,
        writer: &mut DualSinkWriter,
        table: &str,
        limit: Option<usize>,
    ) -> Result<RunReport> {
        let result = self.run_stages(writer, table, limit);
        match &result {
            Ok(report) if report.load.is_complete() => log_stage(table, EtlStage::Complete),
            Ok(_) => info!("[{}] {}: finished with sink failures", EtlStage::Complete, table),
            Err(e) => error!("[{}] {}: {}", EtlStage::Failed, table, e),
        }
        result.context(format!("Processing table '{}'", table))
    }

    fn run_stages(
        &self,
        writer: &mut DualSinkWriter,
        table: &str,
        limit: Option<usize>,
    ) -> Result<RunReport> {
        let df = self.extract(table, limit)?;
        let profiled = self.profile(table, &df);
        let outcome = self.transform(table, &df)?;

        log_stage(table, EtlStage::Reporting);
        let profile = match profiled {
            Ok(profile) => {
                let quality_report = self.write_profile(&profile)?;
                ProfileOutcome::Profiled {
                    profile: Box::new(profile),
                    quality_report,
                }
            }
            Err(e) => {
                warn!(
                    "[{}] {}: {}; no quality report written",
                    EtlStage::Profiling,
                    table,
                    e
                );
                ProfileOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        let anomaly_log = self.write_anomalies(table, &outcome)?;

        let load = self.load(writer, table, &outcome.cleaned);

        Ok(RunReport {
            table: table.to_string(),
            profile,
            cleaning: outcome.summary,
            anomaly_log,
            load,
        })
    }
}

fn log_stage(table: &str, stage: EtlStage) {
    info!("[{}] {}", stage, table);
}
