//! Cross-run aggregation of quality reports into a master summary.
//!
//! Every `*_EDA_Report*.csv` in the reports directory contributes one row per
//! column. Files that cannot be read are skipped with a warning; the summary
//! is only written when at least one report loaded.

use crate::error::{EtlError, Result};
use crate::reporting::REPORT_SEPARATOR;
use crate::types::MasterSummaryRow;
use crate::utils::{
    artifact_timestamp, has_column, require_series, round2, string_values, unique_artifact_path,
};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static REPORT_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*_EDA_Report.*\.csv$").expect("Invalid regex: report file"));

static REPORT_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z_]+)_EDA_Report_").expect("Invalid regex: report table"));

/// Table name used when a report file name does not carry one.
pub const UNKNOWN_TABLE: &str = "UNKNOWN";

/// Rows shown in the top-offenders digest.
pub const DIGEST_ROWS: usize = 10;

/// A report file that could not be aggregated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedReport {
    pub file: PathBuf,
    pub reason: String,
}

/// Result of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SummaryOutcome {
    /// No report could be loaded; nothing was written.
    NoData { skipped: Vec<SkippedReport> },
    Written {
        path: PathBuf,
        rows: Vec<MasterSummaryRow>,
        skipped: Vec<SkippedReport>,
    },
}

/// Builds `MASTER_QUALITY_SUMMARY_<ts>.csv` from the quality reports in a directory.
pub struct SummaryAggregator {
    reports_dir: PathBuf,
}

impl SummaryAggregator {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    /// Aggregate every report and write the master summary.
    pub fn run(&self) -> Result<SummaryOutcome> {
        let files = self.report_files()?;
        if files.is_empty() {
            warn!("No quality reports found in {}", self.reports_dir.display());
            return Ok(SummaryOutcome::NoData {
                skipped: Vec::new(),
            });
        }
        info!("Aggregating {} quality reports", files.len());

        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        let mut loaded_files = 0;
        for file in files {
            match load_report(&file) {
                Ok(mut loaded) => {
                    loaded_files += 1;
                    rows.append(&mut loaded);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", file.display(), e);
                    skipped.push(SkippedReport {
                        file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if loaded_files == 0 {
            warn!("{}", EtlError::NoReportData(self.reports_dir.clone()));
            return Ok(SummaryOutcome::NoData { skipped });
        }

        sort_rows(&mut rows);
        let path = self.write_summary(&rows)?;
        info!("Master summary saved: {} ({} rows)", path.display(), rows.len());

        Ok(SummaryOutcome::Written {
            path,
            rows,
            skipped,
        })
    }

    /// Report files in the directory, sorted by name.
    fn report_files(&self) -> Result<Vec<PathBuf>> {
        if !self.reports_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.reports_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| REPORT_FILE.is_match(n))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn write_summary(&self, rows: &[MasterSummaryRow]) -> Result<PathBuf> {
        let mut df = df!(
            "Tabla" => rows.iter().map(|r| r.table.as_str()).collect::<Vec<_>>(),
            "Columna" => rows.iter().map(|r| r.column.as_str()).collect::<Vec<_>>(),
            "Tipo_Original" => rows.iter().map(|r| r.original_type.as_deref()).collect::<Vec<_>>(),
            "Total_Nulos" => rows.iter().map(|r| r.total_nulls).collect::<Vec<_>>(),
            "Porcentaje_Nulos_Pct" => rows.iter().map(|r| r.null_ratio).collect::<Vec<_>>()
        )?;

        let stem = format!("MASTER_QUALITY_SUMMARY_{}", artifact_timestamp());
        let path = unique_artifact_path(&self.reports_dir, &stem, "csv");
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut df)?;
        Ok(path)
    }
}

/// Table name encoded in a report file name, or [`UNKNOWN_TABLE`].
pub fn table_from_file_name(file_name: &str) -> String {
    REPORT_TABLE
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map_or_else(|| UNKNOWN_TABLE.to_string(), |m| m.as_str().to_string())
}

fn load_report(path: &Path) -> Result<Vec<MasterSummaryRow>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_separator(REPORT_SEPARATOR))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let table = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or_else(|| UNKNOWN_TABLE.to_string(), table_from_file_name);

    let columns = string_values(require_series(&df, "Columna")?)?;
    let height = columns.len();
    let types = optional_strings(&df, "Tipo_Dato", height)?;
    let nulls: Vec<Option<i64>> = match optional_cast(&df, "Nulos", &DataType::Int64)? {
        Some(series) => series.i64()?.into_iter().collect(),
        None => vec![None; height],
    };
    let percentages: Vec<Option<f64>> =
        match optional_cast(&df, "Porcentaje_Nulos", &DataType::Float64)? {
            Some(series) => series.f64()?.into_iter().collect(),
            None => vec![None; height],
        };

    Ok(columns
        .into_iter()
        .zip(types)
        .zip(nulls.into_iter().zip(percentages))
        .map(|((column, original_type), (total_nulls, percentage))| MasterSummaryRow {
            table: table.clone(),
            column: column.unwrap_or_default(),
            original_type,
            total_nulls,
            null_ratio: percentage.map(|p| round2(p / 100.0)),
        })
        .collect())
}

fn optional_strings(df: &DataFrame, column: &str, height: usize) -> Result<Vec<Option<String>>> {
    if !has_column(df, column) {
        return Ok(vec![None; height]);
    }
    Ok(string_values(require_series(df, column)?)?)
}

fn optional_cast(df: &DataFrame, column: &str, dtype: &DataType) -> Result<Option<Series>> {
    if !has_column(df, column) {
        return Ok(None);
    }
    Ok(Some(require_series(df, column)?.cast(dtype)?))
}

/// Table ascending, then null ratio descending with missing ratios last.
fn sort_rows(rows: &mut [MasterSummaryRow]) {
    rows.sort_by(|a, b| {
        a.table.cmp(&b.table).then_with(|| match (a.null_ratio, b.null_ratio) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
    });
}

/// First columns with nulls in summary order, for operator output.
pub fn render_digest(rows: &[MasterSummaryRow]) -> String {
    let offenders = rows.iter().filter(|r| r.total_nulls.is_some_and(|n| n > 0));

    let mut out = format!("Top {} columns with nulls:\n", DIGEST_ROWS);
    for row in offenders.take(DIGEST_ROWS) {
        out.push_str(&format!(
            "  {:<16} {:<24} {:>10} {:>6}\n",
            row.table,
            row.column,
            row.total_nulls.unwrap_or_default(),
            row.null_ratio.map_or("-".to_string(), |r| format!("{:.2}", r))
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn rows_of(outcome: SummaryOutcome) -> Vec<MasterSummaryRow> {
        match outcome {
            SummaryOutcome::Written { rows, .. } => rows,
            other => panic!("expected a written summary, got {:?}", other),
        }
    }

    #[test]
    fn test_table_from_file_name() {
        assert_eq!(
            table_from_file_name("MVSOLICITUDES_EDA_Report_20250101_120000.csv"),
            "MVSOLICITUDES"
        );
        assert_eq!(
            table_from_file_name("PAGO_PORTAL_EDA_Report_20250101_120000.csv"),
            "PAGO_PORTAL"
        );
        assert_eq!(table_from_file_name("notes_EDA_Report.csv"), UNKNOWN_TABLE);
    }

    #[test]
    fn test_empty_directory_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = SummaryAggregator::new(dir.path()).run().unwrap();
        assert_eq!(outcome, SummaryOutcome::NoData { skipped: vec![] });
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = SummaryAggregator::new(dir.path().join("missing")).run().unwrap();
        assert!(matches!(outcome, SummaryOutcome::NoData { .. }));
    }

    #[test]
    fn test_ordering_and_ratio() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "B_EDA_Report_20250101_000000.csv",
            "Columna|Tipo_Dato|Nulos|Porcentaje_Nulos\nY|String|9|90.0\n",
        );
        write(
            dir.path(),
            "A_EDA_Report_20250102_000000.csv",
            "Columna|Tipo_Dato|Nulos|Porcentaje_Nulos\nK|Int64|0|0.0\nX|String|1|10.0\n",
        );

        let rows = rows_of(SummaryAggregator::new(dir.path()).run().unwrap());
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.table.as_str(), r.column.as_str()))
            .collect();
        assert_eq!(order, vec![("A", "X"), ("A", "K"), ("B", "Y")]);
        assert_eq!(rows[0].null_ratio, Some(0.1));
        assert_eq!(rows[2].null_ratio, Some(0.9));
        assert_eq!(rows[2].total_nulls, Some(9));
    }

    #[test]
    fn test_summary_file_written() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "CTGIROS_EDA_Report_20250101_000000.csv",
            "Columna|Tipo_Dato|Nulos|Porcentaje_Nulos\nDSGIRO|String|2|50.0\n",
        );

        let outcome = SummaryAggregator::new(dir.path()).run().unwrap();
        let SummaryOutcome::Written { path, .. } = outcome else {
            panic!("expected a written summary");
        };
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("MASTER_QUALITY_SUMMARY_"));

        let content = fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "Tabla,Columna,Tipo_Original,Total_Nulos,Porcentaje_Nulos_Pct"
        );
        assert!(content.contains("CTGIROS,DSGIRO,String,2,0.5"));
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "A_EDA_Report_20250101_000000.csv",
            "Columna|Tipo_Dato|Nulos|Porcentaje_Nulos\nX|String|1|10.0\n",
        );
        write(dir.path(), "B_EDA_Report_20250101_000000.csv", "Campo|Otro\n1|2\n");

        let outcome = SummaryAggregator::new(dir.path()).run().unwrap();
        let SummaryOutcome::Written { rows, skipped, .. } = outcome else {
            panic!("expected a written summary");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].file.ends_with("B_EDA_Report_20250101_000000.csv"));
    }

    #[test]
    fn test_only_malformed_files_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "A_EDA_Report_20250101_000000.csv", "Campo|Otro\n1|2\n");

        let outcome = SummaryAggregator::new(dir.path()).run().unwrap();
        assert!(matches!(outcome, SummaryOutcome::NoData { ref skipped } if skipped.len() == 1));
        // Only the input report remains
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_header_only_report_is_written() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "EMPTY_EDA_Report_20250101_000000.csv",
            "Columna|Tipo_Dato|Nulos|Porcentaje_Nulos\n",
        );

        let outcome = SummaryAggregator::new(dir.path()).run().unwrap();
        let SummaryOutcome::Written { path, rows, skipped } = outcome else {
            panic!("expected a written summary");
        };
        assert!(rows.is_empty());
        assert!(skipped.is_empty());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_missing_type_column_fills_null() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "CTOFICINAS_EDA_Report_20250101_000000.csv",
            "Columna|Nulos|Porcentaje_Nulos\nLLOFICINA|0|0.0\n",
        );
        let rows = rows_of(SummaryAggregator::new(dir.path()).run().unwrap());
        assert_eq!(rows[0].original_type, None);
        assert_eq!(rows[0].total_nulls, Some(0));
    }

    #[test]
    fn test_other_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "MVSOLICITUDES_anomalies_20250101_000000.csv", "a|b\n1|2\n");
        write(dir.path(), "MASTER_QUALITY_SUMMARY_20250101_000000.csv", "a,b\n1,2\n");
        let outcome = SummaryAggregator::new(dir.path()).run().unwrap();
        assert_eq!(outcome, SummaryOutcome::NoData { skipped: vec![] });
    }

    fn row(table: &str, column: &str, nulls: i64, ratio: f64) -> MasterSummaryRow {
        MasterSummaryRow {
            table: table.to_string(),
            column: column.to_string(),
            original_type: Some("String".to_string()),
            total_nulls: Some(nulls),
            null_ratio: Some(ratio),
        }
    }

    #[test]
    fn test_render_digest() {
        // Already in summary order: table ascending, ratio descending
        let rows = vec![
            row("A", "X", 3, 0.3),
            row("A", "K", 0, 0.0),
            row("B", "Y", 90, 0.9),
        ];
        let digest = render_digest(&rows);
        let listed: Vec<&str> = digest
            .lines()
            .skip(1)
            .map(|l| l.split_whitespace().nth(1).unwrap())
            .collect();
        assert_eq!(listed, vec!["X", "Y"]);
    }

    #[test]
    fn test_render_digest_truncates() {
        let rows: Vec<MasterSummaryRow> = (0..15)
            .map(|i| row("A", &format!("C{}", i), 1, 0.1))
            .collect();
        assert_eq!(render_digest(&rows).lines().count(), DIGEST_ROWS + 1);
    }
}
