use crate::error::{Result, ResultExt};
use crate::types::ColumnQualityRecord;
use crate::utils::{artifact_timestamp, unique_artifact_path};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Separator of every per-table artifact.
pub const REPORT_SEPARATOR: u8 = b'|';

/// Infix identifying quality reports: `<TABLE>_EDA_Report_<ts>.csv`.
pub const QUALITY_REPORT_MARKER: &str = "_EDA_Report_";

/// Infix identifying anomaly logs: `<TABLE>_anomalies_<ts>.csv`.
pub const ANOMALY_LOG_MARKER: &str = "_anomalies_";

/// Write the per-column null report of a table.
pub fn write_quality_report(
    dir: &Path,
    table: &str,
    records: &[ColumnQualityRecord],
) -> Result<PathBuf> {
    let columns: Vec<&str> = records.iter().map(|r| r.column.as_str()).collect();
    let dtypes: Vec<&str> = records.iter().map(|r| r.dtype.as_str()).collect();
    let nulls: Vec<i64> = records.iter().map(|r| r.null_count as i64).collect();
    let percentages: Vec<f64> = records.iter().map(|r| r.null_percentage).collect();

    let mut df = df!(
        "Columna" => columns,
        "Tipo_Dato" => dtypes,
        "Nulos" => nulls,
        "Porcentaje_Nulos" => percentages
    )?;

    let stem = format!("{}{}{}", table, QUALITY_REPORT_MARKER, artifact_timestamp());
    let path = write_artifact(dir, &stem, &mut df)
        .context(format!("Writing quality report for '{}'", table))?;
    info!("Quality report saved: {}", path.display());
    Ok(path)
}

/// Write the quarantined rows of a table.
///
/// Returns `None` without touching the filesystem when there are no anomalies.
pub fn write_anomaly_log(dir: &Path, table: &str, anomalies: &DataFrame) -> Result<Option<PathBuf>> {
    if anomalies.height() == 0 {
        debug!("No anomalies for {}, skipping log", table);
        return Ok(None);
    }

    let mut df = anomalies.clone();
    let stem = format!("{}{}{}", table, ANOMALY_LOG_MARKER, artifact_timestamp());
    let path = write_artifact(dir, &stem, &mut df)
        .context(format!("Writing anomaly log for '{}'", table))?;
    info!("{} anomalies logged to {}", df.height(), path.display());
    Ok(Some(path))
}

fn write_artifact(dir: &Path, stem: &str, df: &mut DataFrame) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = unique_artifact_path(dir, stem, "csv");
    let mut file = File::create(&path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(REPORT_SEPARATOR)
        .finish(df)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ColumnQualityRecord> {
        vec![
            ColumnQualityRecord {
                column: "FCLIMITESUBS".to_string(),
                dtype: "String".to_string(),
                null_count: 3,
                null_percentage: 75.0,
            },
            ColumnQualityRecord {
                column: "LLSOLICITUD".to_string(),
                dtype: "Int64".to_string(),
                null_count: 0,
                null_percentage: 0.0,
            },
        ]
    }

    #[test]
    fn test_write_quality_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_quality_report(dir.path(), "MVSOLICITUDES", &records()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("MVSOLICITUDES_EDA_Report_"));
        assert!(name.ends_with(".csv"));

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Columna|Tipo_Dato|Nulos|Porcentaje_Nulos"));
        assert!(lines.next().unwrap().starts_with("FCLIMITESUBS|String|3|75"));
    }

    #[test]
    fn test_reports_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_quality_report(dir.path(), "CTGIROS", &records()).unwrap();
        let second = write_quality_report(dir.path(), "CTGIROS", &records()).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_anomaly_log_skipped_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = df!("LLSOLICITUD" => Vec::<i64>::new()).unwrap();
        let result = write_anomaly_log(dir.path(), "MVSOLICITUDES", &empty).unwrap();
        assert!(result.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_anomaly_log() {
        let dir = tempfile::tempdir().unwrap();
        let anomalies = df!(
            "LLSOLICITUD" => [7i64],
            "DSNCI" => ["BORRADO"],
            "Tipo_Anomalia" => ["DSNCI_BORRADO"]
        )
        .unwrap();
        let path = write_anomaly_log(dir.path(), "MVSOLICITUDES", &anomalies)
            .unwrap()
            .unwrap();
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("MVSOLICITUDES_anomalies_")
        );
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("7|BORRADO|DSNCI_BORRADO"));
    }
}
