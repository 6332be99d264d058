// Initialization utilities for the batch job
//
// Storage operators and logging/tracing setup

use anyhow::{Context, Result};
use events2parquet_config::{LogFormat, LoggingConfig, RuntimeConfig, StorageBackend};
use events2parquet_storage::{ObjectStore, OpendalStore};
use std::sync::Arc;
use tracing::info;

/// Source and output stores for one run
pub struct Stores {
    pub source: Arc<dyn ObjectStore>,
    pub output: Arc<dyn ObjectStore>,
}

/// Build the source and output stores from RuntimeConfig
pub fn init_stores(config: &RuntimeConfig) -> Result<Stores> {
    info!(
        "Initializing storage with backend: {}",
        config.storage.backend
    );

    match config.storage.backend {
        StorageBackend::Fs => {
            if let Some(fs) = config.storage.fs.as_ref() {
                info!("Using filesystem storage at: {}", fs.path);
            }
        }
        StorageBackend::S3 => {
            if let Some(s3) = config.storage.s3.as_ref() {
                info!("Using S3 storage: region={}", s3.region);
            }
        }
        StorageBackend::R2 => {
            if let Some(r2) = config.storage.r2.as_ref() {
                info!("Using R2 storage: account={}", r2.account_id);
            }
        }
    }

    let source = OpendalStore::from_config(&config.storage, &config.job.source_bucket)
        .context("Failed to initialize source storage")?;
    let output = init_output_store(config)?;

    Ok(Stores {
        source: Arc::new(source),
        output,
    })
}

/// Only the output bucket, for bookmark commands
pub fn init_output_store(config: &RuntimeConfig) -> Result<Arc<dyn ObjectStore>> {
    let output = OpendalStore::from_config(&config.storage, &config.job.output_bucket)
        .context("Failed to initialize output storage")?;
    Ok(Arc::new(output))
}

/// Initialize tracing/logging from the logging config
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(false)),
        ),
    };
}
