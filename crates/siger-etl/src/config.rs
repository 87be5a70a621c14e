//! Configuration types for the extract pipeline.
//!
//! An [`EtlConfig`] is built once at process start, either from a TOML file
//! via [`EtlConfig::from_file`] or with [`EtlConfig::builder()`], and passed by
//! reference into every component. Nothing in the library reads the
//! environment or global state.

use crate::error::{EtlError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Tables exported by the SIGER extract job.
pub const KNOWN_TABLES: [&str; 13] = [
    "MVSOLICITUDES",
    "MVCARATULAS",
    "CTTIPOSOCIEDAD",
    "MVVARACTO",
    "CFVARIABLES",
    "CTSOCIOS",
    "MVFRMACTO",
    "DTFIRMAS",
    "MVDOCADJUNTOS",
    "PAGO_PORTAL",
    "CTOFICINAS",
    "CTGIROS",
    "CTUSUARIOS",
];

/// Table the default rules are written for.
pub const DEFAULT_TABLE: &str = "MVSOLICITUDES";

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/etl.toml";

/// Where the raw delimited extracts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePaths {
    /// Directory containing `<TABLE>.csv` files.
    pub files_root: PathBuf,
}

/// Where artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    /// Quality reports (`<TABLE>_EDA_Report_<ts>.csv`) and master summaries.
    pub reports_dir: PathBuf,
    /// Anomaly logs (`<TABLE>_anomalies_<ts>.csv`).
    pub logs_dir: PathBuf,
    /// Columnar sink output (`<TABLE>.parquet`).
    pub clean_data_dir: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("data/reports"),
            logs_dir: PathBuf::from("data/logs"),
            clean_data_dir: PathBuf::from("data/clean_data"),
        }
    }
}

/// Connection parameters for the relational (L2) sink.
#[derive(Clone, Serialize, Deserialize)]
pub struct RelationalSinkConfig {
    pub driver: String,
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_yes")]
    pub encrypt: String,
    #[serde(default = "default_yes")]
    pub trust_server_certificate: String,
}

fn default_yes() -> String {
    "yes".to_string()
}

impl RelationalSinkConfig {
    /// Connection description safe to log (no credentials).
    pub fn describe(&self) -> String {
        format!(
            "driver={} server={} database={} user={} encrypt={}",
            self.driver, self.server, self.database, self.user, self.encrypt
        )
    }
}

// Keep the password out of debug logs.
impl std::fmt::Debug for RelationalSinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalSinkConfig")
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

/// Columns and thresholds used by the profiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRules {
    /// Column expected to be a primary key.
    pub primary_key: String,
    /// Columns analysed as timestamps (skipped when absent from the table).
    pub temporal_columns: Vec<String>,
    /// Foreign-key / categorical column for the frequency breakdown.
    pub categorical_column: Option<String>,
    /// Timestamps strictly after this instant are counted as future anomalies.
    pub future_threshold: NaiveDateTime,
}

impl Default for ProfileRules {
    fn default() -> Self {
        Self {
            primary_key: "LLSOLICITUD".to_string(),
            temporal_columns: default_temporal_columns(),
            categorical_column: Some("LLOFICINA".to_string()),
            future_threshold: NaiveDate::from_ymd_opt(2026, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
        }
    }
}

/// Columns and markers used by the anomaly detector and cleaner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    /// Raw text timestamp columns, replaced by `<col>_DT` in the cleaned table.
    pub temporal_columns: Vec<String>,
    /// Status column holding the soft-delete marker.
    pub status_column: String,
    /// Status value meaning "logically deleted".
    pub soft_delete_marker: String,
    /// Placeholder years that never represent a business date.
    pub sentinel_years: Vec<i32>,
    /// Legacy columns known to be (almost) always null.
    pub drop_columns: Vec<String>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            temporal_columns: default_temporal_columns(),
            status_column: "DSNCI".to_string(),
            soft_delete_marker: "BORRADO".to_string(),
            sentinel_years: vec![4, 9998],
            drop_columns: vec![
                "LLSOLICITUD_2".to_string(),
                "LLPAGOSSRPETUSU".to_string(),
                "LLPAGOSSINREG".to_string(),
            ],
        }
    }
}

fn default_temporal_columns() -> Vec<String> {
    ["FCINGRESO", "FCLIMITE", "FCLIMITESUBS"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Per-table rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRules {
    pub profile: ProfileRules,
    pub cleaning: CleaningRules,
}

/// Top-level configuration.
///
/// # Example
///
/// ```rust,ignore
/// use siger_etl::config::EtlConfig;
///
/// let config = EtlConfig::builder()
///     .files_root("data/raw")
///     .relational_sink(sink)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub source_paths: SourcePaths,

    #[serde(default)]
    pub output: OutputPaths,

    pub relational_sink: RelationalSinkConfig,

    /// Rule overrides keyed by table name. Tables without an entry use
    /// [`TableRules::default`].
    #[serde(default)]
    pub tables: HashMap<String, TableRules>,
}

impl EtlConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EtlConfigBuilder {
        EtlConfigBuilder::default()
    }

    /// Load and validate a TOML configuration file.
    ///
    /// A missing file, section or required key is a [`EtlError::Config`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EtlError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(content)?;
        config
            .validate()
            .map_err(|e| EtlError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.source_paths.files_root.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingKey(
                "source_paths.files_root".to_string(),
            ));
        }

        for (key, value) in [
            ("relational_sink.driver", &self.relational_sink.driver),
            ("relational_sink.database", &self.relational_sink.database),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::MissingKey(key.to_string()));
            }
        }

        for (table, rules) in &self.tables {
            if rules.profile.primary_key.trim().is_empty() {
                return Err(ConfigValidationError::InvalidRule {
                    table: table.clone(),
                    reason: "primary_key must not be empty".to_string(),
                });
            }
            if rules.cleaning.status_column.trim().is_empty() {
                return Err(ConfigValidationError::InvalidRule {
                    table: table.clone(),
                    reason: "status_column must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Rules for a table, falling back to the defaults.
    pub fn rules_for(&self, table: &str) -> TableRules {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    /// Tables processed when none are named: [`DEFAULT_TABLE`] followed by
    /// every table with configured rules, in name order.
    pub fn configured_tables(&self) -> Vec<String> {
        let mut others: Vec<String> = self
            .tables
            .keys()
            .filter(|t| t.as_str() != DEFAULT_TABLE)
            .cloned()
            .collect();
        others.sort();

        let mut tables = vec![DEFAULT_TABLE.to_string()];
        tables.extend(others);
        tables
    }

    /// Path of the raw extract for a table.
    pub fn source_file(&self, table: &str) -> PathBuf {
        self.source_paths.files_root.join(format!("{}.csv", table))
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required key '{0}'")]
    MissingKey(String),

    #[error("Invalid rules for table '{table}': {reason}")]
    InvalidRule { table: String, reason: String },
}

/// Builder for [`EtlConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EtlConfigBuilder {
    files_root: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    logs_dir: Option<PathBuf>,
    clean_data_dir: Option<PathBuf>,
    relational_sink: Option<RelationalSinkConfig>,
    tables: HashMap<String, TableRules>,
}

impl EtlConfigBuilder {
    /// Set the directory holding the raw `<TABLE>.csv` extracts.
    pub fn files_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.files_root = Some(path.into());
        self
    }

    /// Set the directory for quality reports and master summaries.
    pub fn reports_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.reports_dir = Some(path.into());
        self
    }

    /// Set the directory for anomaly logs.
    pub fn logs_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(path.into());
        self
    }

    /// Set the directory for the columnar sink.
    pub fn clean_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.clean_data_dir = Some(path.into());
        self
    }

    /// Set the relational sink connection parameters.
    pub fn relational_sink(mut self, sink: RelationalSinkConfig) -> Self {
        self.relational_sink = Some(sink);
        self
    }

    /// Override the rules for one table.
    pub fn table_rules(mut self, table: impl Into<String>, rules: TableRules) -> Self {
        self.tables.insert(table.into(), rules);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EtlConfig` or an error if a required value is missing.
    pub fn build(self) -> std::result::Result<EtlConfig, ConfigValidationError> {
        let defaults = OutputPaths::default();
        let config = EtlConfig {
            source_paths: SourcePaths {
                files_root: self
                    .files_root
                    .ok_or_else(|| ConfigValidationError::MissingKey("source_paths.files_root".to_string()))?,
            },
            output: OutputPaths {
                reports_dir: self.reports_dir.unwrap_or(defaults.reports_dir),
                logs_dir: self.logs_dir.unwrap_or(defaults.logs_dir),
                clean_data_dir: self.clean_data_dir.unwrap_or(defaults.clean_data_dir),
            },
            relational_sink: self
                .relational_sink
                .ok_or_else(|| ConfigValidationError::MissingKey("relational_sink".to_string()))?,
            tables: self.tables,
        };

        config.validate()?;
        Ok(config)
    }
}

static_assertions::assert_impl_all!(EtlConfig: Send, Sync);
