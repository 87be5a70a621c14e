//! CLI entry point for the SIGER extract pipeline.

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use siger_etl::config::{DEFAULT_CONFIG_PATH, KNOWN_TABLES};
use siger_etl::summary::render_digest;
use siger_etl::utils::dtype_label;
use siger_etl::{DualSinkWriter, EtlConfig, SummaryAggregator, SummaryOutcome, TablePipeline};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Rows shown by `transform`.
const PREVIEW_ROWS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "siger-etl")]
#[command(about = "Profile, clean and load SIGER legacy extracts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable reports
    ///
    /// Disables all logs; only the JSON result is written.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Profile a table and write its quality report
    Profile {
        /// Table name (e.g. MVSOLICITUDES)
        #[arg(short, long)]
        table: String,

        /// Only read the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Clean a table, log its anomalies and preview the result
    Transform {
        #[arg(short, long)]
        table: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Profile, clean and load tables into both sinks
    Run {
        /// Tables to process; MVSOLICITUDES plus every table with configured rules when omitted
        #[arg(short, long = "table")]
        tables: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Aggregate every quality report into a master summary
    Summarize {
        /// Reports directory (defaults to output.reports_dir)
        #[arg(long)]
        reports_dir: Option<PathBuf>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // .env first so RUST_LOG can come from it
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    // Configuration problems stop the process before any table is read
    let config = EtlConfig::from_file(&cli.config)
        .map_err(|e| anyhow!("{} ({})", e, cli.config.display()))?;
    info!("Configuration loaded from {}", cli.config.display());

    match &cli.command {
        Commands::Profile { table, limit } => run_profile(&cli, &config, table, *limit),
        Commands::Transform { table, limit } => run_transform(&cli, &config, table, *limit),
        Commands::Run { tables, limit } => run_tables(&cli, &config, tables, *limit),
        Commands::Summarize { reports_dir } => run_summarize(&cli, &config, reports_dir.clone()),
    }
}

fn check_table_name(table: &str) {
    if !KNOWN_TABLES.contains(&table) {
        warn!("'{}' is not a known SIGER table; continuing anyway", table);
    }
}

fn run_profile(cli: &Cli, config: &EtlConfig, table: &str, limit: Option<usize>) -> Result<()> {
    check_table_name(table);
    let pipeline = TablePipeline::new(config);

    let df = pipeline.extract(table, limit)?;
    let profile = pipeline.profile(table, &df)?;
    let report_path = pipeline.write_profile(&profile)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("{}", profile.render());
        println!("Quality report: {}", report_path.display());
    }
    Ok(())
}

/// Prints a preview and the final schema of the cleaned table.
///
/// Uses `println!` so the preview is visible regardless of log level.
fn run_transform(cli: &Cli, config: &EtlConfig, table: &str, limit: Option<usize>) -> Result<()> {
    check_table_name(table);
    let pipeline = TablePipeline::new(config);

    let df = pipeline.extract(table, limit)?;
    let outcome = pipeline.transform(table, &df)?;
    let anomaly_log = pipeline.write_anomalies(table, &outcome)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("TRANSFORMED: {}", table);
    println!("{}\n", "=".repeat(80));
    println!("{}", outcome.cleaned.head(Some(PREVIEW_ROWS)));

    println!("\nSCHEMA");
    println!("{}", "-".repeat(40));
    for (name, dtype) in outcome.cleaned.schema().iter() {
        println!("  {:<28} {}", name, dtype_label(dtype));
    }

    println!("\nANOMALIES");
    println!("{}", "-".repeat(40));
    println!("  Date sentinels: {}", outcome.summary.date_sentinel_rows);
    println!("  Soft deletes:   {}", outcome.summary.soft_delete_rows);
    println!("  Unparsed dates: {}", outcome.summary.unparsed_values);
    match anomaly_log {
        Some(path) => println!("  Log: {}", path.display()),
        None => println!("  No anomalies logged"),
    }
    Ok(())
}

fn run_tables(cli: &Cli, config: &EtlConfig, tables: &[String], limit: Option<usize>) -> Result<()> {
    let tables: Vec<String> = if tables.is_empty() {
        config.configured_tables()
    } else {
        tables.to_vec()
    };

    let pipeline = TablePipeline::new(config);
    let mut writer = DualSinkWriter::from_config(config);

    let mut reports = Vec::new();
    let mut failed = Vec::new();
    for table in &tables {
        check_table_name(table);
        match pipeline.run(&mut writer, table, limit) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{}", e);
                failed.push((table.clone(), e));
            }
        }
    }

    if cli.json {
        let failures: Vec<_> = failed
            .iter()
            .map(|(table, e)| serde_json::json!({ "table": table, "error": e }))
            .collect();
        let output = serde_json::json!({ "tables": reports, "failed": failures });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("\n{}", "=".repeat(80));
        println!("RUN SUMMARY");
        println!("{}", "=".repeat(80));
        for report in &reports {
            println!(
                "  {:<16} rows: {:>8}  anomalies: {:>6}  profile: {:<3}  parquet: {:<3}  relational: {}",
                report.table,
                report.cleaning.rows_cleaned,
                report.cleaning.anomaly_rows(),
                if report.profile.profile().is_some() { "ok" } else { "ERR" },
                if report.load.columnar.is_written() { "ok" } else { "ERR" },
                if report.load.relational.is_written() { "ok" } else { "ERR" },
            );
        }
        for (table, e) in &failed {
            println!("  {:<16} FAILED [{}]", table, e.error_code());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} of {} tables failed", failed.len(), tables.len()))
    }
}

fn run_summarize(cli: &Cli, config: &EtlConfig, reports_dir: Option<PathBuf>) -> Result<()> {
    let dir = reports_dir.unwrap_or_else(|| config.output.reports_dir.clone());
    let outcome = SummaryAggregator::new(&dir).run()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        SummaryOutcome::NoData { skipped } => {
            println!("No quality report data found in {}", dir.display());
            if !skipped.is_empty() {
                println!("{} report files could not be read", skipped.len());
            }
        }
        SummaryOutcome::Written {
            path,
            rows,
            skipped,
        } => {
            println!("Master summary: {} ({} rows)", path.display(), rows.len());
            if !skipped.is_empty() {
                println!("Skipped {} unreadable report files", skipped.len());
            }
            println!("\n{}", render_digest(&rows));
        }
    }
    Ok(())
}
