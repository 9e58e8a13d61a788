//! sqlite-pg-migrate CLI - copy the movies catalogue from SQLite to PostgreSQL.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{Config, MigrateError, MigrationResult, Orchestrator, TableStatus};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Migrate the movies catalogue from SQLite to PostgreSQL")]
#[command(version)]
struct Cli {
    /// Optional YAML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Console log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Console log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration (default)
    Run {
        /// Records per batch and per INSERT statement
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,
    },

    /// Compare row counts between source and target
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, MigrateError> {
    let cli = Cli::parse();

    // Command-line flags win over the environment, which wins over the file.
    let mut config = Config::layered(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Run {
        batch_size: None,
        target_schema: None,
    });

    if let Commands::Run {
        batch_size,
        ref target_schema,
    } = command
    {
        if let Some(size) = batch_size {
            config.migration.batch_size = size;
        }
        if let Some(schema) = target_schema {
            config.target.schema = schema.clone();
        }
    }
    config.validate()?;

    // Held until exit so buffered file lines are flushed.
    let _guard = setup_logging(&cli.verbosity, &cli.log_format, &config.migration.log_file)?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {:?}", path);
    }

    match command {
        Commands::Run { .. } => {
            if !cli.output_json {
                println!("{}", config.source.path.display());
            }
            info!(
                "Migrating {} into {}",
                config.source.path.display(),
                config.target.connection_string()
            );

            let orchestrator = Orchestrator::connect(&config).await?;
            let result = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
            Ok(result.status.exit_code())
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::connect(&config).await?;
            let checks = orchestrator.validate().await?;
            let all_match = checks.iter().all(|c| c.matches);

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&checks)?);
            } else {
                println!("Row counts (source / target):");
                for check in &checks {
                    println!(
                        "  {} {}: {} / {}",
                        if check.matches { "OK  " } else { "DIFF" },
                        check.table,
                        check.source_rows,
                        check.target_rows
                    );
                }
                if all_match {
                    println!("Validation completed successfully");
                } else {
                    println!("Validation found differences");
                }
            }
            Ok(if all_match { 0 } else { 2 })
        }
    }
}

fn print_summary(result: &MigrationResult) {
    let headline = match result.status.exit_code() {
        0 => "Migration completed!",
        2 => "Migration completed with errors",
        _ => "Migration aborted",
    };
    println!("\n{}", headline);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Rows read: {}", result.rows_read);
    println!("  Rows inserted: {}", result.rows_inserted);
    for report in &result.tables {
        let status = match report.status {
            TableStatus::Migrated => "migrated",
            TableStatus::Failed if report.is_partial() => "partially migrated",
            TableStatus::Failed => "failed",
            TableStatus::Skipped => "skipped",
        };
        println!(
            "  {}: {} ({} batches, {} read, {} inserted)",
            report.table, status, report.batches, report.rows_read, report.rows_inserted
        );
        if let Some(err) = &report.error {
            println!("    Error: {}", err);
        }
    }

    let failed = result.failed_tables();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|t| t.name()).collect();
        println!("  Failed tables: {}", names.join(", "));
        println!("  Re-run after fixing the cause; committed rows are skipped.");
    }
}

/// Console output plus an append-only log file.
fn setup_logging(verbosity: &str, format: &str, log_file: &Path) -> Result<WorkerGuard, MigrateError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    };

    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log_file.file_name().ok_or_else(|| {
        MigrateError::Config(format!("log_file has no file name: {}", log_file.display()))
    })?;
    std::fs::create_dir_all(dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::INFO);

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let registry = tracing_subscriber::registry().with(file_layer);
    let init = if format == "json" {
        registry.with(console.json().with_filter(level)).try_init()
    } else {
        registry.with(console.with_filter(level)).try_init()
    };
    init.map_err(|e| MigrateError::Config(format!("initializing logging: {}", e)))?;

    Ok(guard)
}
