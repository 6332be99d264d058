// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{anyhow, bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_job_config(&config.job)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_source_overlap(&config.job, &config.pipeline)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Checks needed to inspect or reset a bookmark: the job name, the output
/// bucket and a usable storage backend.
pub fn validate_bookmark_access(config: &RuntimeConfig) -> Result<()> {
    let job = &config.job;
    for (field, flag, value) in [
        ("job_name", "--job-name", &job.job_name),
        ("output_bucket", "--output-bucket", &job.output_bucket),
    ] {
        if value.trim().is_empty() {
            bail!(
                "job.{field} is required\n\n\
                 How to fix:\n  \
                 - pass {flag} <value>"
            );
        }
    }
    validate_storage_config(&config.storage)
}

fn validate_job_config(config: &JobConfig) -> Result<()> {
    let required = [
        ("job_name", "--job-name", "JOB_NAME", &config.job_name),
        (
            "source_bucket",
            "--source-bucket",
            "SOURCE_BUCKET",
            &config.source_bucket,
        ),
        (
            "output_bucket",
            "--output-bucket",
            "OUTPUT_BUCKET",
            &config.output_bucket,
        ),
        (
            "output_database",
            "--output-database",
            "OUTPUT_DATABASE",
            &config.output_database,
        ),
    ];

    for (field, flag, env_key, value) in required {
        if value.trim().is_empty() {
            bail!(
                "job.{field} is required\n\n\
                 How to fix:\n  \
                 - pass {flag} <value>\n  \
                 - or set {prefix}{env_key}\n  \
                 - or add `{field} = \"...\"` under [job] in the config file",
                prefix = ENV_PREFIX,
            );
        }
    }

    for (field, bucket) in [
        ("source_bucket", &config.source_bucket),
        ("output_bucket", &config.output_bucket),
    ] {
        if bucket.contains('/') || bucket.contains("..") {
            bail!(
                "job.{} must be a bare bucket name, got '{}'\n\n\
                 How to fix:\n  \
                 - move path segments into [pipeline] source_prefix / output_prefix",
                field,
                bucket
            );
        }
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<()> {
    if config.source_prefix.is_empty() {
        bail!("pipeline.source_prefix must not be empty");
    }
    if config.output_prefix.is_empty() {
        bail!("pipeline.output_prefix must not be empty");
    }

    // Bookkeeping objects live in the output bucket next to the data.
    for (name, prefix) in [
        ("bookmark_prefix", &config.bookmark_prefix),
        ("staging_prefix", &config.staging_prefix),
    ] {
        if prefix.is_empty() {
            bail!("pipeline.{} must not be empty", name);
        }
        if prefix.starts_with(config.output_prefix.as_str())
            || config.output_prefix.starts_with(prefix.as_str())
        {
            bail!(
                "pipeline.{} ('{}') must not overlap pipeline.output_prefix ('{}')",
                name,
                prefix,
                config.output_prefix
            );
        }
    }

    if config.sample_rows > 1000 {
        warn!(
            sample_rows = config.sample_rows,
            "pipeline.sample_rows is very large; logs will be noisy"
        );
    }

    Ok(())
}

/// With a shared bucket, the source listing must not reach the job's own
/// output, staging or bookmark objects.
fn validate_source_overlap(job: &JobConfig, pipeline: &PipelineConfig) -> Result<()> {
    if job.source_bucket != job.output_bucket {
        return Ok(());
    }

    for (name, prefix) in [
        ("output_prefix", &pipeline.output_prefix),
        ("bookmark_prefix", &pipeline.bookmark_prefix),
        ("staging_prefix", &pipeline.staging_prefix),
    ] {
        if prefix.starts_with(pipeline.source_prefix.as_str())
            || pipeline.source_prefix.starts_with(prefix.as_str())
        {
            bail!(
                "pipeline.source_prefix ('{}') overlaps pipeline.{} ('{}') in bucket '{}'\n\n\
                 How to fix:\n  \
                 - use a separate output bucket\n  \
                 - or move source files under a prefix the job never writes to",
                pipeline.source_prefix,
                name,
                prefix,
                job.source_bucket
            );
        }
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.parquet_row_group_size == 0 {
        bail!("storage.parquet_row_group_size must be greater than 0");
    }

    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.region.is_empty() {
                bail!(
                    "storage.s3.region is required for S3 backend\n\n\
                     How to fix:\n  \
                     - set EVENTS2PARQUET_S3_REGION or AWS_REGION"
                );
            }
        }
        StorageBackend::R2 => {
            let r2 = config
                .r2
                .as_ref()
                .ok_or_else(|| anyhow!("r2 storage backend requires 'r2' configuration"))?;

            if r2.account_id.is_empty() {
                bail!("storage.r2.account_id is required for R2 backend");
            }

            if r2.access_key_id.is_empty() {
                bail!("storage.r2.access_key_id is required for R2 backend (or set AWS_ACCESS_KEY_ID)");
            }

            if r2.secret_access_key.is_empty() {
                bail!(
                    "storage.r2.secret_access_key is required for R2 backend (or set AWS_SECRET_ACCESS_KEY)"
                );
            }
        }
    }

    Ok(())
}
