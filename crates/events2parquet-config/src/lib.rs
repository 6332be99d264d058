// events2parquet-config - Layered configuration for the batch job
//
// Supports configuration from multiple sources:
// 1. Command-line flags (highest priority, applied by the binary)
// 2. Environment variables (EVENTS2PARQUET_* prefix)
// 3. Config file: --config path, EVENTS2PARQUET_CONFIG path,
//    EVENTS2PARQUET_CONFIG_CONTENT inline TOML, or ./config.toml / ./.events2parquet.toml
// 4. Built-in defaults (lowest priority)
//
// Job parameters have no defaults. They are checked by `validate()` once
// every layer has been applied.

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, StdEnvSource, ENV_PREFIX};
pub use events2parquet_core::PartitionTime;

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub job: JobConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Invocation parameters. All required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Label for this job; also keys the bookmark.
    pub job_name: String,
    /// Bucket (or fs subdirectory) holding `<source_prefix>`.
    pub source_bucket: String,
    /// Bucket (or fs subdirectory) receiving `<output_prefix>` and bookmarks.
    pub output_bucket: String,
    /// Catalog database the output is registered in downstream.
    pub output_database: String,
}

/// Pipeline layout and behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source_prefix: String,
    pub output_prefix: String,
    pub bookmark_prefix: String,
    pub staging_prefix: String,
    pub partition_time: PartitionTime,
    /// Rows echoed to the log after transformation.
    pub sample_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_prefix: "events/".to_string(),
            output_prefix: "capstone-analytics/".to_string(),
            bookmark_prefix: "_job_bookmarks/".to_string(),
            staging_prefix: "_staging/".to_string(),
            partition_time: PartitionTime::Source,
            sample_rows: 5,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default = "default_parquet_row_group_size")]
    pub parquet_row_group_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<R2Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            parquet_row_group_size: default_parquet_row_group_size(),
            fs: Some(FsConfig::default()),
            s3: None,
            r2: None,
        }
    }
}

fn default_parquet_row_group_size() -> usize {
    32 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
    R2,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::R2 => write!(f, "r2"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            "r2" | "cloudflare" => Ok(StorageBackend::R2),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3, r2", s),
        }
    }
}

/// Local filesystem: each bucket is a subdirectory of `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct R2Config {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load defaults, then a config file, then `EVENTS2PARQUET_*` env overrides.
    ///
    /// An explicit `path` must exist. Without one, the usual locations are
    /// tried and silently skipped when absent.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        sources::load_config(path, &StdEnvSource)
    }

    /// Same as [`RuntimeConfig::load`] with a caller-supplied environment.
    pub fn load_with_env<E: EnvSource>(path: Option<&std::path::Path>, env: &E) -> Result<Self> {
        sources::load_config(path, env)
    }

    /// Parse a TOML document on top of the defaults (no env, no validation).
    pub fn from_toml(content: &str) -> Result<Self> {
        sources::parse_toml(content)
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Validate only what bookmark inspection needs
    pub fn validate_bookmark_access(&self) -> Result<()> {
        validation::validate_bookmark_access(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Fs);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!("r2".parse::<StorageBackend>().unwrap(), StorageBackend::R2);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert_eq!("aws".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.pipeline.source_prefix, "events/");
        assert_eq!(config.pipeline.output_prefix, "capstone-analytics/");
        assert_eq!(config.pipeline.partition_time, PartitionTime::Source);
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.parquet_row_group_size, 32 * 1024);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.job.job_name.is_empty());
    }
}
