// One run of the job: read → transform → write → commit
//
// The checkpoint comes in as an argument and the advanced checkpoint goes
// back out in the outcome. It is committed only after every output file
// has been promoted; any earlier failure returns with the stored bookmark
// untouched.

use events2parquet_config::{PartitionTime, RuntimeConfig};
use events2parquet_core::{transform_all, OutputRow};
use events2parquet_storage::{
    read_new_events, BookmarkStore, Checkpoint, ObjectStore, PartitionedWriter, Result,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::report::RunReport;

/// Job parameters resolved from configuration
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub job_name: String,
    pub output_database: String,
    pub source_prefix: String,
    pub output_prefix: String,
    pub bookmark_prefix: String,
    pub staging_prefix: String,
    pub partition_time: PartitionTime,
    pub sample_rows: usize,
}

impl JobSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            job_name: config.job.job_name.clone(),
            output_database: config.job.output_database.clone(),
            source_prefix: config.pipeline.source_prefix.clone(),
            output_prefix: config.pipeline.output_prefix.clone(),
            bookmark_prefix: config.pipeline.bookmark_prefix.clone(),
            staging_prefix: config.pipeline.staging_prefix.clone(),
            partition_time: config.pipeline.partition_time,
            sample_rows: config.pipeline.sample_rows,
        }
    }
}

/// Stores plus settings for a run
#[derive(Clone)]
pub struct JobContext {
    pub source: Arc<dyn ObjectStore>,
    pub output: Arc<dyn ObjectStore>,
    pub settings: JobSettings,
}

impl JobContext {
    pub fn bookmarks(&self) -> BookmarkStore {
        BookmarkStore::new(self.output.clone(), self.settings.bookmark_prefix.clone())
    }

    fn writer(&self) -> PartitionedWriter {
        PartitionedWriter::new(
            self.output.clone(),
            &self.settings.job_name,
            self.settings.output_prefix.clone(),
            self.settings.staging_prefix.clone(),
        )
    }
}

/// Result of a successful run
#[derive(Debug)]
pub struct RunOutcome {
    /// The checkpoint now stored (unchanged when nothing was new).
    pub checkpoint: Checkpoint,
    pub report: RunReport,
}

/// Process every source file not in `checkpoint` and commit the result.
pub async fn run_job(ctx: &JobContext, checkpoint: Checkpoint) -> Result<RunOutcome> {
    let settings = &ctx.settings;
    let mut report = RunReport {
        job_name: settings.job_name.clone(),
        output_database: settings.output_database.clone(),
        checkpoint_version: checkpoint.version,
        ..RunReport::default()
    };

    info!(
        job = %settings.job_name,
        source = %ctx.source.location(),
        prefix = %settings.source_prefix,
        version = checkpoint.version,
        processed = checkpoint.processed.len(),
        "Reading new source files"
    );
    let batch = read_new_events(ctx.source.as_ref(), &settings.source_prefix, &checkpoint).await?;

    if batch.is_empty() {
        return Ok(RunOutcome { checkpoint, report });
    }

    report.source_files = batch.files.len();
    report.bytes_read = batch.bytes_read;
    report.records_read = batch.records.len();
    info!(
        files = report.source_files,
        records = report.records_read,
        bytes = report.bytes_read,
        "Read source records"
    );

    info!(partition_time = %settings.partition_time, "Transforming records");
    let (rows, stats) = transform_all(batch.records, settings.partition_time);
    report.rejected = stats.rejected.clone();
    info!(
        input = stats.input,
        output = stats.output,
        rejected = stats.rejected_total(),
        "Transformed records"
    );
    log_sample_rows(&rows, settings.sample_rows);

    let writer = ctx.writer();
    writer.clean_staging().await?;

    let next = checkpoint.advance(batch.files);
    info!(
        output = %ctx.output.location(),
        prefix = %settings.output_prefix,
        version = next.version,
        "Writing Parquet output"
    );
    let summary = writer.write(&rows, next.version).await?;

    ctx.bookmarks().commit(&checkpoint, &next).await?;

    if let Err(e) = writer.clean_staging().await {
        warn!(error = %e, "Failed to clean staging after commit");
    }

    report.rows_written = summary.rows();
    report.bytes_written = summary.bytes();
    report.files_written = summary.files.into_iter().map(|f| f.path).collect();
    report.checkpoint_version = next.version;
    report.committed = true;

    Ok(RunOutcome {
        checkpoint: next,
        report,
    })
}

fn log_sample_rows(rows: &[OutputRow], limit: usize) {
    for row in rows.iter().take(limit) {
        match serde_json::to_string(row) {
            Ok(json) => info!(row = %json, "Sample row"),
            Err(e) => warn!(error = %e, "Could not render sample row"),
        }
    }
}
