use crate::error::Result;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::info;

/// Columnar (L1) sink: one zstd-compressed `<TABLE>.parquet` per table.
///
/// A table's file is replaced on every load.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    dir: PathBuf,
}

impl ParquetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn target(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.parquet", table))
    }

    /// Write `df` and return the file path and row count.
    pub fn write(&self, table: &str, df: &DataFrame) -> Result<(PathBuf, usize)> {
        fs::create_dir_all(&self.dir)?;
        let path = self.target(table);
        let file = File::create(&path)?;

        let mut df = df.clone();
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(&mut df)?;

        info!("Columnar copy saved: {} ({} rows)", path.display(), df.height());
        Ok((path, df.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path().join("clean_data"));
        let df = df!(
            "LLSOLICITUD" => [1i64, 2],
            "DSNCI" => ["A1", "ACTIVO"]
        )
        .unwrap();

        let (path, rows) = sink.write("MVSOLICITUDES", &df).unwrap();
        assert_eq!(rows, 2);
        assert!(path.ends_with("clean_data/MVSOLICITUDES.parquet"));

        let read = ParquetReader::new(File::open(&path).unwrap()).finish().unwrap();
        assert!(read.equals_missing(&df));
    }

    #[test]
    fn test_write_replaces_previous_load() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());
        let first = df!("LLGIRO" => [1i64, 2, 3]).unwrap();
        let second = df!("LLGIRO" => [4i64]).unwrap();

        sink.write("CTGIROS", &first).unwrap();
        let (path, _) = sink.write("CTGIROS", &second).unwrap();

        let read = ParquetReader::new(File::open(&path).unwrap()).finish().unwrap();
        assert_eq!(read.height(), 1);
    }
}
