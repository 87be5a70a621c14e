//! Persistence of cleaned tables.
//!
//! Every cleaned table goes to two independent sinks:
//! - a columnar copy ([`ParquetSink`], `<clean_data_dir>/<TABLE>.parquet`)
//! - a relational copy ([`RelationalSink`], one all-or-nothing batch)
//!
//! A failure in one sink never prevents the attempt on the other. There is no
//! coordination between them, so a table can end up in only one of the two;
//! [`LoadReport`] records which.

mod parquet;
mod relational;

pub use parquet::ParquetSink;
pub use relational::{RelationalSink, SqliteSink, connect};

use crate::config::EtlConfig;
use crate::error::EtlError;
use crate::types::{LoadReport, SinkOutcome};
use polars::prelude::*;
use tracing::error;

/// Writes a cleaned table to both sinks.
pub struct DualSinkWriter {
    columnar: ParquetSink,
    relational: std::result::Result<Box<dyn RelationalSink>, String>,
}

impl DualSinkWriter {
    pub fn new(columnar: ParquetSink, relational: Box<dyn RelationalSink>) -> Self {
        Self {
            columnar,
            relational: Ok(relational),
        }
    }

    /// Build both sinks from configuration.
    ///
    /// A relational connection failure does not fail construction: it is
    /// reported as a relational failure on every subsequent write.
    pub fn from_config(config: &EtlConfig) -> Self {
        let relational = connect(&config.relational_sink).map_err(|e| {
            error!("Relational sink unavailable: {}", e);
            e.to_string()
        });
        Self {
            columnar: ParquetSink::new(&config.output.clean_data_dir),
            relational,
        }
    }

    /// Attempt both sinks and report each outcome.
    pub fn write(&mut self, table: &str, df: &DataFrame) -> LoadReport {
        let columnar = match self.columnar.write(table, df) {
            Ok((path, rows)) => SinkOutcome::Written {
                target: path.display().to_string(),
                rows,
            },
            Err(e) => failed("parquet", table, e),
        };

        let relational = match &mut self.relational {
            Ok(sink) => match sink.load(table, df) {
                Ok(rows) => SinkOutcome::Written {
                    target: sink.target(table),
                    rows,
                },
                Err(e) => failed("relational", table, e),
            },
            Err(reason) => failed(
                "relational",
                table,
                EtlError::Config(format!("connection failed: {}", reason)),
            ),
        };

        LoadReport {
            table: table.to_string(),
            columnar,
            relational,
        }
    }
}

fn failed(sink: &'static str, table: &str, source: EtlError) -> SinkOutcome {
    let error = EtlError::SinkFailed {
        sink,
        table: table.to_string(),
        reason: source.to_string(),
    };
    error!("{}", error);
    SinkOutcome::Failed {
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use rusqlite::Connection;

    struct RejectingSink;

    impl RelationalSink for RejectingSink {
        fn load(&mut self, table: &str, _df: &DataFrame) -> Result<usize> {
            Err(EtlError::Config(format!("no table {}", table)))
        }

        fn target(&self, table: &str) -> String {
            table.to_string()
        }
    }

    fn giros() -> DataFrame {
        df!("LLGIRO" => [1i64, 2], "DSGIRO" => ["A", "B"]).unwrap()
    }

    #[test]
    fn test_both_sinks_written() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE CTGIROS (LLGIRO INTEGER, DSGIRO TEXT);")
            .unwrap();
        let mut writer = DualSinkWriter::new(
            ParquetSink::new(dir.path()),
            Box::new(SqliteSink::from_connection(conn)),
        );

        let report = writer.write("CTGIROS", &giros());
        assert!(report.is_complete());
        assert!(matches!(report.relational, SinkOutcome::Written { rows: 2, .. }));
    }

    #[test]
    fn test_relational_failure_keeps_columnar() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DualSinkWriter::new(ParquetSink::new(dir.path()), Box::new(RejectingSink));

        let report = writer.write("CTGIROS", &giros());
        assert!(report.columnar.is_written());
        assert!(!report.is_complete());
        assert!(dir.path().join("CTGIROS.parquet").exists());
        match report.relational {
            SinkOutcome::Failed { error } => assert!(error.contains("relational sink failed")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_columnar_failure_still_attempts_relational() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be
        let blocked = dir.path().join("clean_data");
        std::fs::write(&blocked, "not a directory").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE CTGIROS (LLGIRO INTEGER, DSGIRO TEXT);")
            .unwrap();
        let mut writer = DualSinkWriter::new(
            ParquetSink::new(&blocked),
            Box::new(SqliteSink::from_connection(conn)),
        );

        let report = writer.write("CTGIROS", &giros());
        assert!(!report.columnar.is_written());
        assert!(report.relational.is_written());
    }
}
