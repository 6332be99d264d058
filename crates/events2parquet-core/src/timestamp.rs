// Event timestamp parsing
//
// Accepts the ISO-8601 shapes seen in practice: RFC 3339 with `Z` or a
// numeric offset, `T` or space separators, optional fractional seconds,
// naive date-times, bare dates, and epoch seconds as a JSON number.
// Naive values carry no offset and are read as UTC wall-clock.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::event::RawTimestamp;

/// Formats that carry an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Formats without an offset. A trailing literal `Z` means UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("timestamp is missing")]
    Missing,

    #[error("timestamp is blank")]
    Blank,

    #[error("unrecognized timestamp format: {0:?}")]
    Unrecognized(String),

    #[error("epoch seconds out of range: {0}")]
    OutOfRange(f64),

    #[error("unsupported timestamp value: {0}")]
    UnsupportedType(String),
}

/// Parse the `timestamp` field of an event.
///
/// The returned value keeps the offset written in the source so partition
/// fields can be taken from the original wall clock.
pub fn parse_event_timestamp(
    raw: Option<&RawTimestamp>,
) -> Result<DateTime<FixedOffset>, TimestampError> {
    match raw {
        None => Err(TimestampError::Missing),
        Some(RawTimestamp::Text(text)) => parse_timestamp_str(text),
        Some(RawTimestamp::EpochSeconds(secs)) => from_epoch_seconds(*secs),
        Some(RawTimestamp::Other(value)) => {
            Err(TimestampError::UnsupportedType(value.to_string()))
        }
    }
}

/// Parse a textual timestamp.
pub fn parse_timestamp_str(text: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TimestampError::Blank);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts);
    }

    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().fixed_offset());
        }
    }

    Err(TimestampError::Unrecognized(text.to_string()))
}

fn from_epoch_seconds(secs: f64) -> Result<DateTime<FixedOffset>, TimestampError> {
    if !secs.is_finite() {
        return Err(TimestampError::OutOfRange(secs));
    }

    // Stored at microsecond precision, so round there rather than at nanos.
    let micros = (secs * 1_000_000.0).round();
    if micros.abs() >= i64::MAX as f64 {
        return Err(TimestampError::OutOfRange(secs));
    }

    DateTime::<Utc>::from_timestamp_micros(micros as i64)
        .map(|ts| ts.fixed_offset())
        .ok_or(TimestampError::OutOfRange(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn text(s: &str) -> RawTimestamp {
        RawTimestamp::Text(s.to_string())
    }

    #[test]
    fn parses_rfc3339_utc() {
        let ts = parse_event_timestamp(Some(&text("2024-03-15T14:22:05Z"))).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 15));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 22, 5));
    }

    #[test]
    fn keeps_source_offset() {
        let ts = parse_timestamp_str("2024-03-15T23:30:00-05:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(ts.naive_local().hour(), 23);
        assert_eq!(ts.naive_utc().day(), 16);
        assert_eq!(ts.naive_utc().hour(), 4);
    }

    #[test]
    fn parses_space_separated_and_fractional_forms() {
        for input in [
            "2024-03-15 14:22:05",
            "2024-03-15 14:22:05.123",
            "2024-03-15T14:22:05.123456",
            "2024-03-15 14:22:05Z",
            "2024-03-15 14:22:05+0000",
            "2024-03-15T14:22",
        ] {
            let ts = parse_timestamp_str(input)
                .unwrap_or_else(|e| panic!("failed to parse {input:?}: {e}"));
            assert_eq!(ts.hour(), 14, "input {input:?}");
            assert_eq!(ts.day(), 15, "input {input:?}");
        }
    }

    #[test]
    fn bare_date_is_midnight() {
        let ts = parse_timestamp_str("2024-03-15").unwrap();
        assert_eq!((ts.day(), ts.hour(), ts.minute()), (15, 0, 0));
    }

    #[test]
    fn epoch_seconds_are_utc() {
        // 2024-03-15T14:22:05Z
        let ts = parse_event_timestamp(Some(&RawTimestamp::EpochSeconds(1_710_512_525.5))).unwrap();
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.nanosecond(), 500_000_000);
    }

    #[test]
    fn fractional_epoch_keeps_whole_microseconds() {
        let ts = parse_event_timestamp(Some(&RawTimestamp::EpochSeconds(1_710_512_525.123))).unwrap();
        assert_eq!(ts.timestamp_micros(), 1_710_512_525_123_000);
        assert_eq!(ts.nanosecond(), 123_000_000);

        let ts = parse_event_timestamp(Some(&RawTimestamp::EpochSeconds(1_710_512_525.999_999_9))).unwrap();
        assert_eq!(ts.timestamp_micros(), 1_710_512_526_000_000);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(parse_event_timestamp(None), Err(TimestampError::Missing));
        assert_eq!(parse_timestamp_str("   "), Err(TimestampError::Blank));
        assert!(matches!(
            parse_timestamp_str("yesterday at noon"),
            Err(TimestampError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_timestamp_str("2024-13-40T99:00:00Z"),
            Err(TimestampError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_event_timestamp(Some(&RawTimestamp::EpochSeconds(f64::NAN))),
            Err(TimestampError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_event_timestamp(Some(&RawTimestamp::Other(serde_json::json!(true)))),
            Err(TimestampError::UnsupportedType(_))
        ));
    }
}
