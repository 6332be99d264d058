// Partition key derivation for time-based organization
//
// Generates Hive-style partition paths:
// year={year}/month={month}/day={day}/hour={hour}
//
// Values are plain decimal numerals with no zero padding ("3", not "03"),
// matching how the partition columns are typed (strings cast from ints).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Partition column names, outermost directory first.
pub const PARTITION_COLUMNS: [&str; 4] = ["year", "month", "day", "hour"];

/// Which clock the partition fields are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionTime {
    /// Wall clock as written in the source timestamp, no conversion.
    #[default]
    Source,
    /// Normalize the instant to UTC first.
    Utc,
}

impl fmt::Display for PartitionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionTime::Source => write!(f, "source"),
            PartitionTime::Utc => write!(f, "utc"),
        }
    }
}

impl std::str::FromStr for PartitionTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" | "local" => Ok(PartitionTime::Source),
            "utc" => Ok(PartitionTime::Utc),
            _ => Err(format!(
                "Unsupported partition time: {}. Supported: source, utc",
                s
            )),
        }
    }
}

/// (year, month, day, hour) of one event.
///
/// Ordered numerically so partitions are written in calendar order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
}

impl PartitionKey {
    /// Derive the key from a parsed timestamp. Pure: same input, same key.
    pub fn derive(ts: &DateTime<FixedOffset>, reference: PartitionTime) -> Self {
        let wall = match reference {
            PartitionTime::Source => ts.naive_local(),
            PartitionTime::Utc => ts.naive_utc(),
        };
        Self::from_naive(&wall)
    }

    fn from_naive(wall: &NaiveDateTime) -> Self {
        Self {
            year: wall.year(),
            month: wall.month(),
            day: wall.day(),
            hour: wall.hour(),
        }
    }

    pub fn year(&self) -> String {
        self.year.to_string()
    }

    pub fn month(&self) -> String {
        self.month.to_string()
    }

    pub fn day(&self) -> String {
        self.day.to_string()
    }

    pub fn hour(&self) -> String {
        self.hour.to_string()
    }

    /// `year=2024/month=3/day=15/hour=14`
    pub fn hive_path(&self) -> String {
        format!(
            "year={}/month={}/day={}/hour={}",
            self.year, self.month, self.day, self.hour
        )
    }

    /// Recover a key from any path containing the four Hive segments in order.
    pub fn from_hive_path(path: &str) -> Option<Self> {
        let mut values = [None::<&str>; 4];
        let mut next = 0;

        for segment in path.split('/') {
            if next == PARTITION_COLUMNS.len() {
                break;
            }
            if let Some((key, value)) = segment.split_once('=') {
                if key == PARTITION_COLUMNS[next] {
                    values[next] = Some(value);
                    next += 1;
                }
            }
        }

        let [year, month, day, hour] = values;
        Some(Self {
            year: year?.parse().ok()?,
            month: month?.parse().ok()?,
            day: day?.parse().ok()?,
            hour: hour?.parse().ok()?,
        })
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hive_path())
    }
}

// Serialized as four string columns so it can be flattened into a row.
impl Serialize for PartitionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PartitionKey", 4)?;
        state.serialize_field("year", &self.year())?;
        state.serialize_field("month", &self.month())?;
        state.serialize_field("day", &self.day())?;
        state.serialize_field("hour", &self.hour())?;
        state.end()
    }
}
