use crate::data::{TimestampCell, TimestampUnit};
use chrono::{DateTime, FixedOffset, Utc};

/// Timestamp-derived cells for one record. The raw value feeds two logical
/// roles, value and booking, which end up identical; consumers still treat
/// them as separate columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TimestampColumns {
    pub value_timestamp: Option<TimestampCell>,
    pub booking_timestamp: Option<TimestampCell>,
    pub readable_value_date: Option<String>,
    pub readable_booking_date: Option<String>,
}

pub(crate) fn derive_columns(
    raw: Option<i64>,
    unit: TimestampUnit,
    offset: FixedOffset,
) -> TimestampColumns {
    let Some(raw) = raw else {
        return TimestampColumns::default();
    };
    match unit {
        TimestampUnit::Nanoseconds => {
            let formatted = sql_datetime_utc(raw).map(TimestampCell::Formatted);
            TimestampColumns {
                value_timestamp: formatted.clone(),
                booking_timestamp: formatted,
                readable_value_date: None,
                readable_booking_date: None,
            }
        }
        TimestampUnit::Milliseconds => {
            let readable = readable_at_offset(raw, offset);
            TimestampColumns {
                value_timestamp: Some(TimestampCell::Raw(raw)),
                booking_timestamp: Some(TimestampCell::Raw(raw)),
                readable_value_date: readable.clone(),
                readable_booking_date: readable,
            }
        }
    }
}

/// Nanoseconds since epoch → `YYYY-MM-DD HH:MM:SS` in UTC, whole seconds
/// only. Sub-second precision is discarded by the integer division.
fn sql_datetime_utc(raw_ns: i64) -> Option<String> {
    let dt = DateTime::<Utc>::from_timestamp(raw_ns / 1_000_000_000, 0)?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Milliseconds since epoch → `YYYY-MM-DD HH:MM:SS.mmm +0200` at the
/// configured fixed offset (rendered without the colon).
fn readable_at_offset(raw_ms: i64, offset: FixedOffset) -> Option<String> {
    let dt = DateTime::<Utc>::from_timestamp_millis(raw_ms)?.with_timezone(&offset);
    Some(dt.format("%Y-%m-%d %H:%M:%S%.3f %z").to_string())
}
