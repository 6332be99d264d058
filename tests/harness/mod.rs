//! Shared fixtures for the job integration tests
//!
//! - in-memory stores (OpenDAL memory service)
//! - gzip NDJSON fixture writer
//! - `FaultyStore`, which fails selected writes to simulate a crash mid-run
//! - Parquet read-back helpers

#![allow(dead_code)]

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use events2parquet::{JobContext, JobSettings};
use events2parquet_config::PartitionTime;
use events2parquet_storage::{ObjectStore, OpendalStore, PipelineError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SCENARIO: &str = r#"{"timestamp":"2024-03-15T14:22:05Z","user_id":"u-1001","event_type":"purchase","product_id":"p-42","quantity":2,"price":19.99,"category":"toys"}"#;

pub fn memory_store(name: &str) -> Arc<dyn ObjectStore> {
    let operator = opendal::Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish();
    Arc::new(OpendalStore::new(operator, format!("memory://{}", name)))
}

pub fn settings(job_name: &str) -> JobSettings {
    JobSettings {
        job_name: job_name.to_string(),
        output_database: "analytics".to_string(),
        source_prefix: "events/".to_string(),
        output_prefix: "capstone-analytics/".to_string(),
        bookmark_prefix: "_job_bookmarks/".to_string(),
        staging_prefix: "_staging/".to_string(),
        partition_time: PartitionTime::Source,
        sample_rows: 5,
    }
}

pub fn context(source: Arc<dyn ObjectStore>, output: Arc<dyn ObjectStore>) -> JobContext {
    JobContext {
        source,
        output,
        settings: settings("capstone"),
    }
}

pub fn gzip_lines(lines: &[&str]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        encoder.write_all(line.as_bytes()).expect("gzip write");
        encoder.write_all(b"\n").expect("gzip write");
    }
    encoder.finish().expect("gzip finish")
}

pub async fn put_events(store: &dyn ObjectStore, path: &str, lines: &[&str]) {
    store
        .write(path, gzip_lines(lines))
        .await
        .expect("seed source file");
}

/// Decode every batch of a Parquet object.
pub async fn read_parquet(store: &dyn ObjectStore, path: &str) -> Vec<RecordBatch> {
    let bytes = store.read(path).await.expect("read parquet object");
    ParquetRecordBatchReaderBuilder::try_new(bytes)
        .expect("parquet footer")
        .build()
        .expect("parquet reader")
        .map(|batch| batch.expect("record batch"))
        .collect()
}

/// Row count across every file under `prefix`.
pub async fn total_rows(store: &dyn ObjectStore, prefix: &str) -> usize {
    let mut total = 0;
    for path in store.list(prefix).await.expect("list output") {
        for batch in read_parquet(store, &path).await {
            total += batch.num_rows();
        }
    }
    total
}

/// Wraps a store and fails writes under `prefix` once `allowed` of them succeeded.
pub struct FaultyStore {
    inner: Arc<dyn ObjectStore>,
    prefix: String,
    allowed: usize,
    seen: AtomicUsize,
}

impl FaultyStore {
    pub fn failing_writes(inner: Arc<dyn ObjectStore>, prefix: &str, allowed: usize) -> Self {
        Self {
            inner,
            prefix: prefix.to_string(),
            allowed,
            seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    fn location(&self) -> &str {
        self.inner.location()
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn read_if_exists(&self, path: &str) -> Result<Option<Bytes>> {
        self.inner.read_if_exists(path).await
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        if path.starts_with(&self.prefix) {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n >= self.allowed {
                return Err(PipelineError::storage("write", path, "injected failure"));
            }
        }
        self.inner.write(path, data).await
    }

    async fn promote(&self, from: &str, to: &str) -> Result<()> {
        self.inner.promote(from, to).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path).await
    }
}
