// OutputRow -> Arrow RecordBatch conversion
//
// Builds the nine file columns. Partition columns are not materialized.

use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, Float64Builder, Int64Builder, RecordBatch, StringBuilder,
    TimestampMicrosecondBuilder,
};
use std::sync::Arc;

use crate::schema::event_file_schema;
use crate::transform::OutputRow;

/// Build a RecordBatch from rows that share one partition.
pub fn rows_to_record_batch(rows: &[&OutputRow]) -> Result<RecordBatch> {
    let capacity = rows.len();

    let mut timestamp = TimestampMicrosecondBuilder::with_capacity(capacity).with_timezone("UTC");
    let mut user_id = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut session_id = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut event_type = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut product_id = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut quantity = Int64Builder::with_capacity(capacity);
    let mut price = Float64Builder::with_capacity(capacity);
    let mut category = StringBuilder::with_capacity(capacity, capacity * 8);
    let mut search_query = StringBuilder::with_capacity(capacity, capacity * 8);

    for row in rows {
        timestamp.append_value(row.timestamp.timestamp_micros());
        user_id.append_option(row.user_id.as_deref());
        session_id.append_option(row.session_id.as_deref());
        event_type.append_option(row.event_type.as_deref());
        product_id.append_option(row.product_id.as_deref());
        quantity.append_option(row.quantity);
        price.append_option(row.price);
        category.append_option(row.category.as_deref());
        search_query.append_option(row.search_query.as_deref());
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(timestamp.finish()),
        Arc::new(user_id.finish()),
        Arc::new(session_id.finish()),
        Arc::new(event_type.finish()),
        Arc::new(product_id.finish()),
        Arc::new(quantity.finish()),
        Arc::new(price.finish()),
        Arc::new(category.finish()),
        Arc::new(search_query.finish()),
    ];

    RecordBatch::try_new(event_file_schema(), columns).context("failed to build event batch")
}
