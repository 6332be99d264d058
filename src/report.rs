// End-of-run summary

use std::collections::BTreeMap;
use tracing::info;

/// What one run read, rejected and wrote
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub job_name: String,
    pub output_database: String,
    pub source_files: usize,
    pub bytes_read: u64,
    pub records_read: usize,
    pub rows_written: usize,
    /// Rejected record counts keyed by reason
    pub rejected: BTreeMap<&'static str, usize>,
    pub files_written: Vec<String>,
    pub bytes_written: usize,
    pub checkpoint_version: u64,
    /// False when there was nothing new to process
    pub committed: bool,
}

impl RunReport {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn log(&self) {
        if !self.committed {
            info!(
                job = %self.job_name,
                version = self.checkpoint_version,
                "Nothing new to process; bookmark unchanged"
            );
            return;
        }

        info!(
            job = %self.job_name,
            files = self.source_files,
            records = self.records_read,
            rows = self.rows_written,
            rejected = self.rejected_total(),
            outputs = self.files_written.len(),
            bytes = self.bytes_written,
            version = self.checkpoint_version,
            "Job complete"
        );

        for (reason, count) in &self.rejected {
            info!(reason, count, "Rejected records");
        }

        info!(
            database = %self.output_database,
            "Output ready for catalog registration"
        );
    }
}
