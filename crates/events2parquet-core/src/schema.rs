// Arrow schemas for event output
//
// Data files hold the nine event columns. The four partition columns are
// encoded in the Hive directory names, so they only appear in the table
// schema that a catalog would register.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::sync::{Arc, OnceLock};

use crate::partition::PARTITION_COLUMNS;

/// Schema of the columns physically stored in each Parquet file.
pub fn event_file_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| Arc::new(Schema::new(file_fields())))
        .clone()
}

/// Full table schema: file columns followed by the partition columns.
pub fn event_table_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let mut fields = file_fields();
            fields.extend(
                PARTITION_COLUMNS
                    .iter()
                    .map(|name| Field::new(*name, DataType::Utf8, false)),
            );
            Arc::new(Schema::new(fields))
        })
        .clone()
}

fn file_fields() -> Vec<Field> {
    vec![
        // Instant in UTC, microsecond precision
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("user_id", DataType::Utf8, true),
        Field::new("session_id", DataType::Utf8, true),
        Field::new("event_type", DataType::Utf8, true),
        Field::new("product_id", DataType::Utf8, true),
        Field::new("quantity", DataType::Int64, true),
        Field::new("price", DataType::Float64, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("search_query", DataType::Utf8, true),
    ]
}
