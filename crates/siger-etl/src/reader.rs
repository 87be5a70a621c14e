//! Loader for the raw `|`-delimited, Latin-1 SIGER extracts.

use crate::error::{EtlError, Result, ResultExt};
use crate::utils::decode_latin1;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Rows sampled for schema inference.
pub const INFER_SCHEMA_LENGTH: usize = 10_000;

/// Options for reading one extract.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub separator: u8,
    pub infer_schema_length: usize,
    /// Columns whose inferred dtype is overridden. Entries for columns that are
    /// not in the file are ignored.
    pub dtype_overrides: Vec<(String, DataType)>,
    /// Maximum number of rows to load; `None` loads everything.
    pub limit: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: b'|',
            infer_schema_length: INFER_SCHEMA_LENGTH,
            // DSNCI holds numeric-looking identifiers mixed with text markers
            dtype_overrides: vec![("DSNCI".to_string(), DataType::String)],
            limit: None,
        }
    }
}

impl ReadOptions {
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Reads `<root>/<TABLE>.csv` into a DataFrame.
pub struct TableReader {
    root: PathBuf,
    options: ReadOptions,
}

impl TableReader {
    pub fn new(root: impl Into<PathBuf>, options: ReadOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    /// Load a table's full row set (or the first `limit` rows).
    pub fn read_table(&self, table: &str) -> Result<DataFrame> {
        let path = self.root.join(format!("{}.csv", table));
        if !path.exists() {
            return Err(EtlError::SourceNotFound {
                table: table.to_string(),
                root: self.root.clone(),
            });
        }

        info!("Extracting data from: {}", path.display());
        let df = read_delimited(&path, &self.options)
            .context(format!("Reading source file for '{}'", table))?;
        info!("Data extracted: {} rows, {} columns", df.height(), df.width());

        Ok(df)
    }
}

/// Read a delimited Latin-1 file with the given options.
pub fn read_delimited(path: &Path, options: &ReadOptions) -> Result<DataFrame> {
    let bytes = std::fs::read(path)?;
    let text = decode_latin1(&bytes);

    let header: Vec<&str> = text
        .lines()
        .next()
        .map(|line| {
            line.split(options.separator as char)
                .map(|name| name.trim().trim_matches('"'))
                .collect()
        })
        .unwrap_or_default();

    let mut overrides = Schema::default();
    for (name, dtype) in &options.dtype_overrides {
        if header.contains(&name.as_str()) {
            overrides.with_column(name.as_str().into(), dtype.clone());
        }
    }
    debug!("Applying {} dtype overrides", overrides.len());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(options.infer_schema_length))
        .with_n_rows(options.limit)
        .with_schema_overwrite(Some(Arc::new(overrides)))
        .with_parse_options(CsvParseOptions::default().with_separator(options.separator))
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()?;

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_extract(dir: &Path, table: &str, bytes: &[u8]) {
        std::fs::write(dir.join(format!("{}.csv", table)), bytes).unwrap();
    }

    #[test]
    fn test_read_table_latin1_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        // "Peña" encoded as ISO-8859-1
        let mut content = b"LLSOLICITUD|DSNCI|NOMBRE\n1|00123|Pe".to_vec();
        content.push(0xF1);
        content.extend_from_slice(b"a\n2|BORRADO|Ruiz\n");
        write_extract(dir.path(), "MVSOLICITUDES", &content);

        let reader = TableReader::new(dir.path(), ReadOptions::default());
        let df = reader.read_table("MVSOLICITUDES").unwrap();

        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("DSNCI").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("LLSOLICITUD").unwrap().dtype(), &DataType::Int64);

        let nombre = df.column("NOMBRE").unwrap().as_materialized_series().str().unwrap().get(0);
        assert_eq!(nombre, Some("Peña"));
        // Leading zeros survive because DSNCI is forced to text
        let dsnci = df.column("DSNCI").unwrap().as_materialized_series().str().unwrap().get(0);
        assert_eq!(dsnci, Some("00123"));
    }

    #[test]
    fn test_read_table_limit() {
        let dir = tempfile::tempdir().unwrap();
        write_extract(dir.path(), "CTGIROS", b"LLGIRO|DSGIRO\n1|A\n2|B\n3|C\n");

        let reader = TableReader::new(dir.path(), ReadOptions::default().with_limit(Some(2)));
        let df = reader.read_table("CTGIROS").unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_missing_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = TableReader::new(dir.path(), ReadOptions::default());
        let err = reader.read_table("CTUSUARIOS").unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_NOT_FOUND");
    }
}
