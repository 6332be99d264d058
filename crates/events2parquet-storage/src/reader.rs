// Ingestor: enumerate and decode new source files
//
// Source objects are gzip-compressed NDJSON. Plain NDJSON is accepted too,
// detected by the absence of the gzip magic bytes. Any undecodable byte or
// malformed line fails the whole run; nothing is skipped silently.

use events2parquet_core::EventRecord;
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, Read};

use crate::bookmark::Checkpoint;
use crate::error::{PipelineError, Result};
use crate::store::ObjectStore;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Records read from the files not yet in the checkpoint
#[derive(Debug, Default)]
pub struct SourceBatch {
    /// Source paths consumed, sorted.
    pub files: Vec<String>,
    pub records: Vec<EventRecord>,
    /// Compressed bytes read across all files.
    pub bytes_read: u64,
}

impl SourceBatch {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Files under `prefix` that are not hidden and not yet processed, sorted by path.
pub async fn list_source_files(
    store: &dyn ObjectStore,
    prefix: &str,
    checkpoint: &Checkpoint,
) -> Result<Vec<String>> {
    let listed = store.list(prefix).await?;
    let total = listed.len();

    let mut files: Vec<String> = listed
        .into_iter()
        .filter(|path| !is_hidden(relative_to(path, prefix)))
        .filter(|path| !checkpoint.is_processed(path))
        .collect();
    files.sort();

    tracing::debug!(
        prefix,
        listed = total,
        new = files.len(),
        "Listed source objects"
    );
    Ok(files)
}

/// Read one source object and decode its records.
pub async fn read_source_file(store: &dyn ObjectStore, path: &str) -> Result<Vec<EventRecord>> {
    let bytes = store.read(path).await?;
    decode_events(path, &bytes)
}

/// List, read and decode every new file.
pub async fn read_new_events(
    store: &dyn ObjectStore,
    prefix: &str,
    checkpoint: &Checkpoint,
) -> Result<SourceBatch> {
    let files = list_source_files(store, prefix, checkpoint).await?;
    let mut batch = SourceBatch::default();

    for path in &files {
        let bytes = store.read(path).await?;
        batch.bytes_read += bytes.len() as u64;

        let records = decode_events(path, &bytes)?;
        tracing::debug!(path = %path, records = records.len(), "Read source file");
        batch.records.extend(records);
    }

    batch.files = files;
    Ok(batch)
}

/// Decompress (if gzip) and parse one record per non-blank line.
pub fn decode_events(path: &str, bytes: &[u8]) -> Result<Vec<EventRecord>> {
    let input: Box<dyn Read + '_> = if bytes.starts_with(&GZIP_MAGIC) {
        Box::new(MultiGzDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };

    let mut reader = BufReader::new(input);
    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        line_no += 1;
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| PipelineError::ingestion_at(path, line_no, e))?;
        if read == 0 {
            break;
        }

        let line = std::str::from_utf8(&buf)
            .map_err(|e| PipelineError::ingestion_at(path, line_no, e))?;
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        let record = EventRecord::from_json_line(line)
            .map_err(|e| PipelineError::ingestion_at(path, line_no, e))?;
        records.push(record);
    }

    Ok(records)
}

/// Hadoop convention: `_SUCCESS`, `.crc` sidecars and anything under a
/// `_temporary/` or dot directory are not data.
fn is_hidden(relative: &str) -> bool {
    relative
        .split('/')
        .any(|segment| segment.starts_with('_') || segment.starts_with('.'))
}

fn relative_to<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn decodes_gzip_and_skips_blank_lines() {
        let bytes = gzip(
            "{\"timestamp\":\"2024-03-15T14:22:05Z\",\"user_id\":\"u1\"}\n\n  \n{\"user_id\":\"u2\"}\r\n",
        );
        let records = decode_events("events/a.json.gz", &bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id.as_deref(), Some("u1"));
        assert_eq!(records[1].user_id.as_deref(), Some("u2"));
        assert!(records[1].timestamp.is_none());
    }

    #[test]
    fn decodes_concatenated_gzip_members() {
        let mut bytes = gzip("{\"user_id\":\"u1\"}\n");
        bytes.extend(gzip("{\"user_id\":\"u2\"}\n"));
        let records = decode_events("events/multi.json.gz", &bytes).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn plain_ndjson_passes_through() {
        let records = decode_events("events/plain.json", b"{\"user_id\":\"u1\"}").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let bytes = gzip("{\"user_id\":\"u1\"}\n{broken\n");
        let err = decode_events("events/bad.json.gz", &bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E002Ingestion);
        assert!(matches!(
            err,
            PipelineError::Ingestion { line: Some(2), ref path, .. } if path == "events/bad.json.gz"
        ));
    }

    #[test]
    fn non_object_line_is_rejected() {
        let err = decode_events("events/arr.json", b"[1,2,3]\n").unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion { line: Some(1), .. }));
    }

    #[test]
    fn truncated_gzip_is_an_ingestion_error() {
        let mut bytes = gzip(&"{\"user_id\":\"u1\"}\n".repeat(100));
        bytes.truncate(bytes.len() / 2);
        let err = decode_events("events/trunc.json.gz", &bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E002Ingestion);
    }

    #[test]
    fn hidden_names() {
        assert!(is_hidden("_SUCCESS"));
        assert!(is_hidden("2024/.part-0.crc"));
        assert!(is_hidden("_temporary/0/part-0.json.gz"));
        assert!(is_hidden("2024/.spark-staging/part-0.json.gz"));
        assert!(!is_hidden("2024/03/part-0.json.gz"));
        assert!(!is_hidden("part-0.json.gz"));
    }

    #[tokio::test]
    async fn listing_skips_hidden_directories_below_the_prefix() {
        let operator = opendal::Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let store = crate::store::OpendalStore::new(operator, "memory://raw");
        for path in [
            "_landing/events/2024/part-1.json.gz",
            "_landing/events/_temporary/0/part-2.json.gz",
            "_landing/events/.hidden/part-3.json.gz",
            "_landing/events/_SUCCESS",
        ] {
            store.write(path, gzip("{}\n")).await.unwrap();
        }

        let files = list_source_files(&store, "_landing/events/", &Checkpoint::empty("job"))
            .await
            .unwrap();
        assert_eq!(files, vec!["_landing/events/2024/part-1.json.gz"]);
    }
}
