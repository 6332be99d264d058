// Job bookmark: the ledger of source files already turned into output.
//
// Stored as one JSON object per job in the output bucket. Loaded once at
// run start and committed once at the end, after every output file has
// been promoted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::store::ObjectStore;

/// Versioned set of processed source paths for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job_name: String,
    /// 0 means the job has never committed.
    pub version: u64,
    pub processed: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn empty(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            version: 0,
            processed: BTreeSet::new(),
            updated_at: None,
        }
    }

    pub fn is_processed(&self, path: &str) -> bool {
        self.processed.contains(path)
    }

    /// The checkpoint that records `files` on top of this one.
    pub fn advance<I, S>(&self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut processed = self.processed.clone();
        processed.extend(files.into_iter().map(Into::into));
        Self {
            job_name: self.job_name.clone(),
            version: self.version + 1,
            processed,
            updated_at: Some(Utc::now()),
        }
    }

    /// The next version with nothing recorded as processed.
    pub fn cleared(&self) -> Self {
        Self {
            job_name: self.job_name.clone(),
            version: self.version + 1,
            processed: BTreeSet::new(),
            updated_at: Some(Utc::now()),
        }
    }
}

/// Loads and commits checkpoints under `<prefix><job_name>.json`
#[derive(Clone)]
pub struct BookmarkStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl BookmarkStore {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, job_name: &str) -> String {
        format!("{}{}.json", self.prefix, crate::object_safe_name(job_name))
    }

    /// Load the stored checkpoint, or an empty one when the job never ran.
    pub async fn load(&self, job_name: &str) -> Result<Checkpoint> {
        let path = self.path_for(job_name);
        let Some(bytes) = self
            .store
            .read_if_exists(&path)
            .await
            .map_err(|e| PipelineError::bookmark_corrupt(&path, e))?
        else {
            tracing::debug!(job = job_name, path = %path, "No bookmark found, starting fresh");
            return Ok(Checkpoint::empty(job_name));
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::bookmark_corrupt(&path, e))?;

        if checkpoint.job_name != job_name {
            return Err(PipelineError::bookmark_corrupt(
                &path,
                format!(
                    "belongs to job '{}', not '{}'",
                    checkpoint.job_name, job_name
                ),
            ));
        }

        Ok(checkpoint)
    }

    /// Persist `next` if the stored checkpoint is still `expected`.
    pub async fn commit(&self, expected: &Checkpoint, next: &Checkpoint) -> Result<()> {
        let path = self.path_for(&next.job_name);

        if next.job_name != expected.job_name || next.version != expected.version + 1 {
            return Err(PipelineError::bookmark_corrupt(
                &path,
                format!(
                    "cannot commit version {} of '{}' over version {} of '{}'",
                    next.version, next.job_name, expected.version, expected.job_name
                ),
            ));
        }

        let current = self.load(&expected.job_name).await?;
        if current.version != expected.version {
            return Err(PipelineError::bookmark_conflict(
                &expected.job_name,
                expected.version,
                current.version,
            ));
        }

        let body = serde_json::to_vec_pretty(next)
            .map_err(|e| PipelineError::bookmark_corrupt(&path, e))?;
        self.store.write(&path, body).await?;

        tracing::info!(
            job = %next.job_name,
            version = next.version,
            processed = next.processed.len(),
            "Committed bookmark"
        );
        Ok(())
    }

    /// Forget every processed file so the next run reads the whole source
    /// prefix again. The version still moves forward, so output file names
    /// from earlier runs are never reused. Returns `None` when the job has
    /// no stored checkpoint.
    pub async fn reset(&self, job_name: &str) -> Result<Option<Checkpoint>> {
        let current = self.load(job_name).await?;
        if current.version == 0 {
            return Ok(None);
        }

        let cleared = current.cleared();
        self.commit(&current, &cleared).await?;
        Ok(Some(cleared))
    }
}
