//! Storage side of the events2parquet job
//!
//! - [`store`]: object store abstraction over OpenDAL
//! - [`bookmark`]: versioned checkpoint of processed source files
//! - [`reader`]: the Ingestor (list, decompress, parse)
//! - [`writer`]: partitioned Parquet output with staging and promotion

pub mod bookmark;
pub mod error;
pub mod reader;
pub mod store;
pub mod writer;

pub use bookmark::{BookmarkStore, Checkpoint};
pub use error::{ErrorCode, PipelineError, Result};
pub use reader::{decode_events, list_source_files, read_new_events, read_source_file, SourceBatch};
pub use store::{ObjectStore, OpendalStore};
pub use writer::{PartitionedWriter, WriteSummary, WrittenFile};

/// Make a job name usable as a single object-key segment.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; everything else becomes `_`.
pub fn object_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
