use crate::config::RelationalSinkConfig;
use crate::error::{EtlError, Result};
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::path::Path;
use tracing::{debug, info, warn};

/// Relational (L2) sink.
///
/// Implementations insert every row of a table in one batch: either all rows
/// are committed or none are. The destination table must already exist.
pub trait RelationalSink {
    /// Append all rows of `df` to `table` and return the number inserted.
    fn load(&mut self, table: &str, df: &DataFrame) -> Result<usize>;

    /// Where rows go, for reports and logs.
    fn target(&self, table: &str) -> String;
}

/// Open a relational sink for the configured driver.
pub fn connect(config: &RelationalSinkConfig) -> Result<Box<dyn RelationalSink>> {
    debug!("Connecting relational sink: {}", config.describe());
    match config.driver.to_ascii_lowercase().as_str() {
        "sqlite" => Ok(Box::new(SqliteSink::open(&config.database)?)),
        other => Err(EtlError::Config(format!(
            "unsupported relational sink driver '{}'",
            other
        ))),
    }
}

/// SQLite-backed relational sink.
pub struct SqliteSink {
    conn: Connection,
    database: String,
}

impl SqliteSink {
    /// Open (or create) the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            database: path.display().to_string(),
        })
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            database: "sqlite".to_string(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RelationalSink for SqliteSink {
    fn load(&mut self, table: &str, df: &DataFrame) -> Result<usize> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|c| quote_identifier(c.as_str()))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders
        );
        let rows = sql_rows(df)?;

        let tx = self.conn.transaction()?;
        let inserted = insert_all(&tx, &sql, &rows);
        match inserted {
            Ok(count) => {
                tx.commit()?;
                info!("Loaded {} rows into {}", count, self.target(table));
                Ok(count)
            }
            Err(e) => {
                warn!("Rolling back load of {}: {}", table, e);
                tx.rollback()?;
                Err(e.into())
            }
        }
    }

    fn target(&self, table: &str) -> String {
        format!("{}::{}", self.database, table)
    }
}

fn insert_all(conn: &Connection, sql: &str, rows: &[Vec<Value>]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(sql)?;
    for row in rows {
        stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(rows.len())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Row-major SQL values for a table.
///
/// Integers and booleans map to INTEGER, floats to REAL; every other dtype
/// (text, datetimes) is rendered as TEXT.
fn sql_rows(df: &DataFrame) -> Result<Vec<Vec<Value>>> {
    let mut rows: Vec<Vec<Value>> = (0..df.height())
        .map(|_| Vec::with_capacity(df.width()))
        .collect();

    for column in df.get_columns() {
        for (row, value) in rows.iter_mut().zip(sql_values(column.as_materialized_series())?) {
            row.push(value);
        }
    }
    Ok(rows)
}

fn sql_values(series: &Series) -> Result<Vec<Value>> {
    let dtype = series.dtype();
    let values = if dtype == &DataType::Boolean {
        series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |b| Value::Integer(i64::from(b))))
            .collect()
    } else if dtype.is_integer() {
        series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Integer))
            .collect()
    } else if dtype.is_float() {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Real))
            .collect()
    } else {
        series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Text(s.to_string())))
            .collect()
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;

    fn sink_with_table(ddl: &str) -> SqliteSink {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(ddl).unwrap();
        SqliteSink::from_connection(conn)
    }

    fn count(sink: &SqliteSink, table: &str) -> i64 {
        sink.connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_load_inserts_all_rows() {
        let mut sink = sink_with_table(
            "CREATE TABLE CTGIROS (LLGIRO INTEGER, DSGIRO TEXT, TASA REAL, ACTIVO INTEGER);",
        );
        let df = df!(
            "LLGIRO" => [1i64, 2],
            "DSGIRO" => [Some("Comercio"), None],
            "TASA" => [0.5f64, 1.25],
            "ACTIVO" => [true, false]
        )
        .unwrap();

        assert_eq!(sink.load("CTGIROS", &df).unwrap(), 2);
        assert_eq!(count(&sink, "CTGIROS"), 2);

        let (name, tasa, activo): (Option<String>, f64, i64) = sink
            .connection()
            .query_row(
                "SELECT DSGIRO, TASA, ACTIVO FROM CTGIROS WHERE LLGIRO = 2",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(name, None);
        assert_eq!(tasa, 1.25);
        assert_eq!(activo, 0);
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let mut sink =
            sink_with_table("CREATE TABLE CTGIROS (LLGIRO INTEGER NOT NULL, DSGIRO TEXT);");
        let df = df!(
            "LLGIRO" => [Some(1i64), None],
            "DSGIRO" => ["A", "B"]
        )
        .unwrap();

        let err = sink.load("CTGIROS", &df).unwrap_err();
        assert_eq!(err.error_code(), "SQLITE_ERROR");
        assert_eq!(count(&sink, "CTGIROS"), 0);
    }

    #[test]
    fn test_missing_table_is_error() {
        let mut sink = sink_with_table("CREATE TABLE OTHER (X INTEGER);");
        let df = df!("LLGIRO" => [1i64]).unwrap();
        assert!(sink.load("CTGIROS", &df).is_err());
    }

    #[test]
    fn test_datetimes_stored_as_text() {
        let mut sink = sink_with_table("CREATE TABLE T (FCINGRESO_DT TEXT);");
        let ts = NaiveDateTime::parse_from_str("2021-03-01 10:00:00", TIMESTAMP_FORMAT).unwrap();
        let series = Series::new("FCINGRESO_DT".into(), [ts.and_utc().timestamp_millis()])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let df = DataFrame::new(vec![series.into()]).unwrap();

        sink.load("T", &df).unwrap();
        let stored: String = sink
            .connection()
            .query_row("SELECT FCINGRESO_DT FROM T", [], |r| r.get(0))
            .unwrap();
        assert!(stored.starts_with("2021-03-01 10:00:00"));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("PAGO_PORTAL"), "\"PAGO_PORTAL\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_connect_rejects_unknown_driver() {
        let config = RelationalSinkConfig {
            driver: "ODBC Driver 17 for SQL Server".to_string(),
            server: "db01".to_string(),
            database: "SIGER".to_string(),
            user: "etl".to_string(),
            password: "secret".to_string(),
            encrypt: "yes".to_string(),
            trust_server_certificate: "yes".to_string(),
        };
        let err = connect(&config).err().unwrap();
        assert!(err.is_config());
    }
}
