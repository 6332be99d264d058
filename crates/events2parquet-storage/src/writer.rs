// Partitioned Parquet writer with staging and promotion
//
// Rows are grouped by partition key and each group becomes one Parquet
// file. Every file is staged under `<staging_prefix><job>/<attempt>/` first;
// only after all of them are staged are they moved to their final,
// deterministic names. A retried run with the same bookmark version writes
// the same names, so it overwrites partial output instead of duplicating it.

use events2parquet_core::{encode_record_batch, rows_to_record_batch, OutputRow, PartitionKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::store::ObjectStore;

/// One promoted output file
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: String,
    pub partition: PartitionKey,
    pub rows: usize,
    pub bytes: usize,
    /// blake3 of the file contents, hex encoded
    pub hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    pub files: Vec<WrittenFile>,
}

impl WriteSummary {
    pub fn rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes).sum()
    }
}

struct StagedFile {
    staged_path: String,
    final_path: String,
    partition: PartitionKey,
    rows: usize,
    bytes: usize,
    hash: String,
}

pub struct PartitionedWriter {
    store: Arc<dyn ObjectStore>,
    job_name: String,
    output_prefix: String,
    staging_prefix: String,
}

impl PartitionedWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        job_name: &str,
        output_prefix: impl Into<String>,
        staging_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            job_name: crate::object_safe_name(job_name),
            output_prefix: output_prefix.into(),
            staging_prefix: staging_prefix.into(),
        }
    }

    /// `<output_prefix>year=Y/month=M/day=D/hour=H/part-<version>-<job>.parquet`
    pub fn final_path(&self, partition: &PartitionKey, version: u64) -> String {
        format!(
            "{}{}/{}",
            self.output_prefix,
            partition.hive_path(),
            self.file_name(version)
        )
    }

    fn file_name(&self, version: u64) -> String {
        format!("part-{:010}-{}.parquet", version, self.job_name)
    }

    fn job_staging_root(&self) -> String {
        format!("{}{}/", self.staging_prefix, self.job_name)
    }

    /// Delete everything this job left under the staging prefix.
    pub async fn clean_staging(&self) -> Result<usize> {
        self.remove_tree(&self.job_staging_root()).await
    }

    async fn remove_tree(&self, root: &str) -> Result<usize> {
        let stale = self.store.list(root).await?;
        for path in &stale {
            self.store.delete(path).await?;
        }
        if !stale.is_empty() {
            tracing::debug!(root, removed = stale.len(), "Removed staging objects");
        }
        Ok(stale.len())
    }

    /// Write `rows` as one file per partition for bookmark `version`.
    pub async fn write(&self, rows: &[OutputRow], version: u64) -> Result<WriteSummary> {
        if rows.is_empty() {
            return Ok(WriteSummary::default());
        }

        let mut partitions: BTreeMap<&PartitionKey, Vec<&OutputRow>> = BTreeMap::new();
        for row in rows {
            partitions.entry(&row.partition).or_default().push(row);
        }

        let attempt_root = format!("{}{}/", self.job_staging_root(), Uuid::new_v4());
        tracing::info!(
            partitions = partitions.len(),
            rows = rows.len(),
            staging = %attempt_root,
            "Writing partitions"
        );

        let result = self
            .stage_and_promote(&partitions, version, &attempt_root)
            .await;

        if result.is_err() {
            if let Err(e) = self.remove_tree(&attempt_root).await {
                tracing::warn!(error = %e, staging = %attempt_root, "Failed to clean staging after error");
            }
        }

        result
    }

    async fn stage_and_promote(
        &self,
        partitions: &BTreeMap<&PartitionKey, Vec<&OutputRow>>,
        version: u64,
        attempt_root: &str,
    ) -> Result<WriteSummary> {
        let mut staged = Vec::with_capacity(partitions.len());

        for (partition, rows) in partitions {
            let final_path = self.final_path(partition, version);
            let staged_path = format!(
                "{}{}/{}",
                attempt_root,
                partition.hive_path(),
                self.file_name(version)
            );

            let batch = rows_to_record_batch(rows)
                .map_err(|e| PipelineError::write_failure(&final_path, e))?;
            let encoded = encode_record_batch(&batch)
                .map_err(|e| PipelineError::write_failure(&final_path, e))?;
            let bytes = encoded.bytes.len();

            self.store
                .write(&staged_path, encoded.bytes)
                .await
                .map_err(|e| PipelineError::write_failure(&staged_path, e))?;

            tracing::debug!(
                partition = %partition,
                rows = encoded.row_count,
                bytes,
                hash = %encoded.hash,
                "Staged partition file"
            );

            staged.push(StagedFile {
                staged_path,
                final_path,
                partition: (*partition).clone(),
                rows: encoded.row_count,
                bytes,
                hash: encoded.hash,
            });
        }

        let mut summary = WriteSummary::default();
        for file in staged {
            self.store
                .promote(&file.staged_path, &file.final_path)
                .await
                .map_err(|e| PipelineError::write_failure(&file.final_path, e))?;

            tracing::info!(
                path = %file.final_path,
                rows = file.rows,
                bytes = file.bytes,
                "Wrote partition file"
            );

            summary.files.push(WrittenFile {
                path: file.final_path,
                partition: file.partition,
                rows: file.rows,
                bytes: file.bytes,
                hash: file.hash,
            });
        }

        Ok(summary)
    }
}
