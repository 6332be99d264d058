//! Object store abstraction over OpenDAL
//!
//! Every stage talks to storage through [`ObjectStore`] so tests can swap in
//! the in-memory service or a fault-injecting wrapper.

use async_trait::async_trait;
use bytes::Bytes;
use events2parquet_config::{StorageBackend, StorageConfig};
use opendal::{EntryMode, ErrorKind, Operator};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Minimal object operations needed by the job
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable location, used in logs.
    fn location(&self) -> &str;

    /// Recursively list file paths under `prefix`. A missing prefix lists as empty.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Read an object; `None` when it does not exist.
    async fn read_if_exists(&self, path: &str) -> Result<Option<Bytes>>;

    /// Write (or overwrite) an object in a single put.
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Move `from` to `to`, overwriting `to`.
    async fn promote(&self, from: &str, to: &str) -> Result<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Read an object that must exist.
    async fn read(&self, path: &str) -> Result<Bytes> {
        self.read_if_exists(path)
            .await?
            .ok_or_else(|| PipelineError::storage("read", path, "object not found"))
    }
}

/// [`ObjectStore`] backed by an OpenDAL operator
#[derive(Clone, Debug)]
pub struct OpendalStore {
    operator: Operator,
    location: String,
}

impl OpendalStore {
    pub fn new(operator: Operator, location: impl Into<String>) -> Self {
        Self {
            operator,
            location: location.into(),
        }
    }

    /// Build a store for one bucket from the storage config.
    ///
    /// For the filesystem backend the bucket is a subdirectory of
    /// `storage.fs.path`.
    pub fn from_config(config: &StorageConfig, bucket: &str) -> Result<Self> {
        let (operator, location) = match config.backend {
            StorageBackend::Fs => {
                let fs = config.fs.as_ref().ok_or_else(|| {
                    PipelineError::invalid_config("fs config required for filesystem backend")
                })?;

                let root = Path::new(&fs.path).join(bucket);
                let root = root.to_string_lossy().into_owned();
                let builder = opendal::services::Fs::default().root(&root);
                let operator = Operator::new(builder)
                    .map_err(|e| PipelineError::storage("init", &root, e))?
                    .finish();
                (operator, format!("fs://{}", root))
            }
            StorageBackend::S3 => {
                let s3 = config.s3.as_ref().ok_or_else(|| {
                    PipelineError::invalid_config("s3 config required for S3 backend")
                })?;

                let mut builder = opendal::services::S3::default()
                    .bucket(bucket)
                    .region(&s3.region);

                if let Some(endpoint) = &s3.endpoint {
                    builder = builder.endpoint(endpoint);
                }

                let operator = Operator::new(builder)
                    .map_err(|e| PipelineError::storage("init", bucket, e))?
                    .finish();
                (operator, format!("s3://{}", bucket))
            }
            StorageBackend::R2 => {
                let r2 = config.r2.as_ref().ok_or_else(|| {
                    PipelineError::invalid_config("r2 config required for R2 backend")
                })?;

                // Use endpoint from config if provided, otherwise construct from account_id
                let endpoint = r2
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", r2.account_id));

                let builder = opendal::services::S3::default()
                    .bucket(bucket)
                    .region("auto")
                    .endpoint(&endpoint)
                    .access_key_id(&r2.access_key_id)
                    .secret_access_key(&r2.secret_access_key);

                let operator = Operator::new(builder)
                    .map_err(|e| PipelineError::storage("init", bucket, e))?
                    .finish();
                (operator, format!("r2://{}", bucket))
            }
        };

        tracing::debug!(location = %location, "Storage operator initialized");
        Ok(Self::new(operator, location))
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    fn location(&self) -> &str {
        &self.location
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = match self.operator.list_with(prefix).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::storage("list", prefix, e)),
        };

        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().mode() == EntryMode::FILE)
            .map(|entry| entry.path().to_string())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn read_if_exists(&self, path: &str) -> Result<Option<Bytes>> {
        match self.operator.read(path).await {
            Ok(buffer) => Ok(Some(buffer.to_bytes())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::storage("read", path, e)),
        }
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.operator
            .write(path, data)
            .await
            .map_err(|e| PipelineError::storage("write", path, e))?;
        Ok(())
    }

    async fn promote(&self, from: &str, to: &str) -> Result<()> {
        let capability = self.operator.info().full_capability();

        if capability.rename {
            return self
                .operator
                .rename(from, to)
                .await
                .map_err(|e| PipelineError::storage("rename", from, e));
        }

        if capability.copy {
            self.operator
                .copy(from, to)
                .await
                .map_err(|e| PipelineError::storage("copy", from, e))?;
        } else {
            let data = self.read(from).await?;
            self.write(to, data.to_vec()).await?;
        }

        self.delete(from).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match self.operator.delete(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::storage("delete", path, e)),
        }
    }
}
