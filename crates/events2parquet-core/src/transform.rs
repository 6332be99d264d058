//! Record-level transformation: parse timestamp, derive partition, project.
//!
//! Strictly one record in, one row (or one rejection) out. There is no
//! cross-record state.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::event::EventRecord;
use crate::partition::{PartitionKey, PartitionTime};
use crate::timestamp::{parse_event_timestamp, TimestampError};

/// Output columns in projection order. The last four are partition columns.
pub const OUTPUT_COLUMNS: [&str; 13] = [
    "timestamp",
    "user_id",
    "session_id",
    "event_type",
    "product_id",
    "quantity",
    "price",
    "category",
    "search_query",
    "year",
    "month",
    "day",
    "hour",
];

/// A normalized event, projected to the fixed output schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub timestamp: DateTime<FixedOffset>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub event_type: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub search_query: Option<String>,
    #[serde(flatten)]
    pub partition: PartitionKey,
}

/// Why a record produced no output row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}

impl Rejection {
    /// Stable label used for aggregate counts.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Timestamp(TimestampError::Missing) => "missing_timestamp",
            Rejection::Timestamp(TimestampError::Blank) => "blank_timestamp",
            Rejection::Timestamp(TimestampError::Unrecognized(_)) => "unparseable_timestamp",
            Rejection::Timestamp(TimestampError::OutOfRange(_)) => "timestamp_out_of_range",
            Rejection::Timestamp(TimestampError::UnsupportedType(_)) => "unsupported_timestamp",
        }
    }
}

/// Transform one event.
pub fn transform_event(
    record: EventRecord,
    reference: PartitionTime,
) -> Result<OutputRow, Rejection> {
    let timestamp = parse_event_timestamp(record.timestamp.as_ref())?;
    let partition = PartitionKey::derive(&timestamp, reference);

    Ok(OutputRow {
        timestamp,
        user_id: record.user_id,
        session_id: record.session_id,
        event_type: record.event_type,
        product_id: record.product_id,
        quantity: record.quantity,
        price: record.price,
        category: record.category,
        search_query: record.search_query,
        partition,
    })
}

/// Aggregate counts for one transform pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub input: usize,
    pub output: usize,
    pub rejected: BTreeMap<&'static str, usize>,
}

impl TransformStats {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Transform a batch of events, dropping and counting rejections.
pub fn transform_all<I>(records: I, reference: PartitionTime) -> (Vec<OutputRow>, TransformStats)
where
    I: IntoIterator<Item = EventRecord>,
{
    let mut stats = TransformStats::default();
    let mut rows = Vec::new();

    for record in records {
        stats.input += 1;
        match transform_event(record, reference) {
            Ok(row) => rows.push(row),
            Err(rejection) => {
                tracing::debug!(reason = rejection.reason(), error = %rejection, "Rejected event");
                *stats.rejected.entry(rejection.reason()).or_default() += 1;
            }
        }
    }

    stats.output = rows.len();
    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawTimestamp;

    fn event(ts: Option<&str>) -> EventRecord {
        EventRecord {
            timestamp: ts.map(|s| RawTimestamp::Text(s.to_string())),
            user_id: Some("u1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn projects_purchase_event() {
        let record = EventRecord::from_json_line(
            r#"{"timestamp":"2024-03-15T14:22:05Z","user_id":"u1","event_type":"purchase","product_id":"p9","quantity":2,"price":19.99,"category":"toys","ignored":1}"#,
        )
        .unwrap();

        let row = transform_event(record, PartitionTime::Source).unwrap();
        assert_eq!(row.partition.year(), "2024");
        assert_eq!(row.partition.month(), "3");
        assert_eq!(row.partition.day(), "15");
        assert_eq!(row.partition.hour(), "14");
        assert_eq!(row.event_type.as_deref(), Some("purchase"));
        assert_eq!(row.quantity, Some(2));
        assert_eq!(row.price, Some(19.99));
        assert_eq!(row.session_id, None);
        assert_eq!(row.search_query, None);
    }

    #[test]
    fn serialized_row_has_exactly_the_output_columns() {
        let row = transform_event(event(Some("2024-03-15T14:22:05Z")), PartitionTime::Source)
            .unwrap();
        let value = serde_json::to_value(&row).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let mut expected = OUTPUT_COLUMNS.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        assert!(object["session_id"].is_null());
        assert!(object["quantity"].is_null());
        assert_eq!(object["hour"], "14");
    }

    #[test]
    fn serialized_row_keeps_projection_order() {
        let row = transform_event(event(Some("2024-03-15T14:22:05Z")), PartitionTime::Source)
            .unwrap();
        let json = serde_json::to_string(&row).unwrap();

        let positions: Vec<usize> = OUTPUT_COLUMNS
            .iter()
            .map(|c| json.find(&format!("\"{}\":", c)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn rejection_reasons() {
        assert_eq!(
            transform_event(event(None), PartitionTime::Source)
                .unwrap_err()
                .reason(),
            "missing_timestamp"
        );
        assert_eq!(
            transform_event(event(Some("not a time")), PartitionTime::Source)
                .unwrap_err()
                .reason(),
            "unparseable_timestamp"
        );
    }

    #[test]
    fn one_bad_record_does_not_affect_the_rest() {
        let records = vec![
            event(Some("2024-03-15T14:22:05Z")),
            event(Some("garbage")),
            event(Some("2024-03-15T15:00:00Z")),
            event(Some("2024-03-16 00:01:02")),
        ];

        let (rows, stats) = transform_all(records, PartitionTime::Source);
        assert_eq!(rows.len(), 3);
        assert_eq!(stats.input, 4);
        assert_eq!(stats.output, 3);
        assert_eq!(stats.rejected_total(), 1);
        assert_eq!(stats.rejected.get("unparseable_timestamp"), Some(&1));
    }
}
