// events2parquet - incremental gzip NDJSON events to Hive-partitioned Parquet
//
// Reads compressed event files from the source bucket, normalizes their
// timestamps, and writes year/month/day/hour partitioned Parquet to the
// output bucket. A per-job bookmark in the output bucket makes repeated
// runs incremental.

use anyhow::{Context, Result};
use events2parquet_config::RuntimeConfig;
use events2parquet_core::set_parquet_row_group_size;
use events2parquet_storage::{BookmarkStore, Checkpoint};

mod init;
mod pipeline;
mod report;

pub use init::{init_output_store, init_stores, init_tracing, Stores};
pub use pipeline::{run_job, JobContext, JobSettings, RunOutcome};
pub use report::RunReport;

/// Run the job with a resolved and validated configuration.
pub async fn run_with_config(config: &RuntimeConfig) -> Result<RunOutcome> {
    // Configure Parquet writer properties before first use
    set_parquet_row_group_size(config.storage.parquet_row_group_size);

    let stores = init_stores(config)?;
    let ctx = JobContext {
        source: stores.source,
        output: stores.output,
        settings: JobSettings::from_config(config),
    };

    let checkpoint = ctx
        .bookmarks()
        .load(&ctx.settings.job_name)
        .await
        .context("Failed to load job bookmark")?;

    let outcome = run_job(&ctx, checkpoint).await?;
    outcome.report.log();
    Ok(outcome)
}

fn bookmark_store(config: &RuntimeConfig) -> Result<BookmarkStore> {
    let output = init_output_store(config)?;
    Ok(BookmarkStore::new(
        output,
        config.pipeline.bookmark_prefix.clone(),
    ))
}

/// Load the stored checkpoint for the configured job.
pub async fn show_bookmark(config: &RuntimeConfig) -> Result<Checkpoint> {
    let bookmarks = bookmark_store(config)?;
    let checkpoint = bookmarks.load(&config.job.job_name).await?;
    Ok(checkpoint)
}

/// Clear the processed-file set so the next run reprocesses every file.
pub async fn reset_bookmark(config: &RuntimeConfig) -> Result<Option<Checkpoint>> {
    let bookmarks = bookmark_store(config)?;
    let cleared = bookmarks.reset(&config.job.job_name).await?;
    Ok(cleared)
}
