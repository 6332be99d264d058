use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use events2parquet::{init_tracing, reset_bookmark, run_with_config, show_bookmark};
use events2parquet_config::{FsConfig, RuntimeConfig, StorageBackend};
use events2parquet_storage::PipelineError;
use std::path::PathBuf;

/// Incremental batch job turning gzip NDJSON events into partitioned Parquet
#[derive(Parser)]
#[command(name = "events2parquet")]
#[command(version)]
#[command(about = "Convert new gzip NDJSON event files into Hive-partitioned Parquet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Job name; also keys the bookmark
    #[arg(long, alias = "JOB_NAME", value_name = "NAME", global = true)]
    job_name: Option<String>,

    /// Bucket holding the source events
    #[arg(long, alias = "SOURCE_BUCKET", value_name = "BUCKET", global = true)]
    source_bucket: Option<String>,

    /// Bucket receiving Parquet output and bookmarks
    #[arg(long, alias = "OUTPUT_BUCKET", value_name = "BUCKET", global = true)]
    output_bucket: Option<String>,

    /// Catalog database the output is registered in
    #[arg(long, alias = "OUTPUT_DATABASE", value_name = "NAME", global = true)]
    output_database: Option<String>,

    /// Storage backend: fs, s3, r2
    #[arg(long, value_name = "BACKEND", global = true)]
    backend: Option<StorageBackend>,

    /// Root directory for the fs backend (buckets are subdirectories)
    #[arg(long, value_name = "DIR", global = true)]
    storage_path: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Process new source files and commit the bookmark (default)
    Run,
    /// Print the stored bookmark as JSON
    ShowBookmark,
    /// Delete the stored bookmark so every file is reprocessed
    ResetBookmark,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: defaults, config file, environment
    let mut config =
        RuntimeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Step 2: CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);

    init_tracing(&config.logging);

    let command = cli.command.unwrap_or(Command::Run);

    // Step 3: validate before any I/O
    let validation = match command {
        Command::Run => config.validate(),
        Command::ShowBookmark | Command::ResetBookmark => config.validate_bookmark_access(),
    };
    validation.map_err(|e| PipelineError::invalid_config(format!("{:#}", e)))?;

    match command {
        Command::Run => {
            run_with_config(&config).await?;
        }
        Command::ShowBookmark => {
            let checkpoint = show_bookmark(&config).await?;
            let json = serde_json::to_string_pretty(&checkpoint)
                .context("Failed to render bookmark")?;
            println!("{}", json);
        }
        Command::ResetBookmark => {
            match reset_bookmark(&config).await? {
                Some(cleared) => tracing::info!(
                    job = %config.job.job_name,
                    version = cleared.version,
                    "Bookmark cleared"
                ),
                None => tracing::info!(job = %config.job.job_name, "No bookmark to reset"),
            }
        }
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(name) = &cli.job_name {
        config.job.job_name = name.clone();
    }
    if let Some(bucket) = &cli.source_bucket {
        config.job.source_bucket = bucket.clone();
    }
    if let Some(bucket) = &cli.output_bucket {
        config.job.output_bucket = bucket.clone();
    }
    if let Some(database) = &cli.output_database {
        config.job.output_database = database.clone();
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if let Some(path) = &cli.storage_path {
        config.storage.fs.get_or_insert_with(FsConfig::default).path =
            path.to_string_lossy().to_string();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}
