use super::{
    FsConfig, LogFormat, PartitionTime, R2Config, RuntimeConfig, S3Config, StorageBackend,
};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "EVENTS2PARQUET_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get an environment variable with the EVENTS2PARQUET_ prefix applied.
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the EVENTS2PARQUET_ prefix.
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Process environment.
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Apply environment-variable overrides to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Job parameters
    if let Some(name) = get_env_string(env, "JOB_NAME") {
        config.job.job_name = name;
    }
    if let Some(bucket) = get_env_string(env, "SOURCE_BUCKET") {
        config.job.source_bucket = bucket;
    }
    if let Some(bucket) = get_env_string(env, "OUTPUT_BUCKET") {
        config.job.output_bucket = bucket;
    }
    if let Some(database) = get_env_string(env, "OUTPUT_DATABASE") {
        config.job.output_database = database;
    }

    // Pipeline layout
    if let Some(prefix) = get_env_string(env, "SOURCE_PREFIX") {
        config.pipeline.source_prefix = normalize_prefix(prefix);
    }
    if let Some(prefix) = get_env_string(env, "OUTPUT_PREFIX") {
        config.pipeline.output_prefix = normalize_prefix(prefix);
    }
    if let Some(prefix) = get_env_string(env, "BOOKMARK_PREFIX") {
        config.pipeline.bookmark_prefix = normalize_prefix(prefix);
    }
    if let Some(prefix) = get_env_string(env, "STAGING_PREFIX") {
        config.pipeline.staging_prefix = normalize_prefix(prefix);
    }
    if let Some(value) = get_env_string(env, "PARTITION_TIME") {
        config.pipeline.partition_time = value
            .parse::<PartitionTime>()
            .map_err(|e| anyhow!("Invalid {}PARTITION_TIME value: {}", ENV_PREFIX, e))?;
    }
    if let Some(val) = get_env_usize(env, "SAMPLE_ROWS")? {
        config.pipeline.sample_rows = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid EVENTS2PARQUET_STORAGE_BACKEND value")?;
    }
    if let Some(val) = get_env_usize(env, "PARQUET_ROW_GROUP_SIZE")? {
        config.storage.parquet_row_group_size = val;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage
    if let Some(region) = get_env_string(env, "S3_REGION") {
        ensure_s3(config).region = region;
    } else if config.storage.backend == StorageBackend::S3 {
        if let Some(region) = env.get_raw("AWS_REGION") {
            ensure_s3(config).region = region;
        }
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }

    // R2 storage
    if let Some(account_id) = get_env_string(env, "R2_ACCOUNT_ID") {
        ensure_r2(config).account_id = account_id;
    }
    if config.storage.backend == StorageBackend::R2 {
        // AWS standard credentials (without EVENTS2PARQUET_ prefix for compatibility)
        if let Some(access_key_id) = env.get_raw("AWS_ACCESS_KEY_ID") {
            ensure_r2(config).access_key_id = access_key_id;
        }
        if let Some(secret_access_key) = env.get_raw("AWS_SECRET_ACCESS_KEY") {
            ensure_r2(config).secret_access_key = secret_access_key;
        }
        if let Some(endpoint) = env.get_raw("AWS_ENDPOINT_URL") {
            ensure_r2(config).endpoint = Some(endpoint);
        }
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn ensure_r2(config: &mut RuntimeConfig) -> &mut R2Config {
    config.storage.r2.get_or_insert_with(R2Config::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Ensure a non-empty prefix ends with '/'.
pub(crate) fn normalize_prefix(prefix: String) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix
    } else {
        format!("{}/", prefix)
    }
}
