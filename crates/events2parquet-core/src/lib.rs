// events2parquet-core - Pure event normalization logic
//
// Everything between "a JSON line" and "Parquet bytes for one partition":
// typed event records, timestamp parsing, partition key derivation,
// column projection and Arrow/Parquet encoding.
// No I/O, no async, no storage. Those live in events2parquet-storage.

pub mod batch;
pub mod encoding;
pub mod event;
pub mod partition;
pub mod schema;
pub mod timestamp;
pub mod transform;

pub use batch::rows_to_record_batch;
pub use encoding::{encode_record_batch, set_parquet_row_group_size, EncodedParquet};
pub use event::{EventRecord, RawTimestamp, RecordParseError};
pub use partition::{PartitionKey, PartitionTime, PARTITION_COLUMNS};
pub use schema::{event_file_schema, event_table_schema};
pub use timestamp::{parse_event_timestamp, TimestampError};
pub use transform::{
    transform_all, transform_event, OutputRow, Rejection, TransformStats, OUTPUT_COLUMNS,
};
