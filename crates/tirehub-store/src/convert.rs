//! Column conversions shared by the row mappers.
//!
//! Timestamps are stored as RFC 3339 UTC text with millisecond precision and
//! a `Z` suffix so that plain text comparison in SQL orders them correctly.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

/// Format a timestamp for storage.
pub fn ts_to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn opt_ts_to_db(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(ts_to_db)
}

/// Parse a stored timestamp found in column `idx`.
pub fn ts_from_db(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn opt_ts_from_db(idx: usize, text: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    text.map(|t| ts_from_db(idx, &t)).transpose()
}

/// Parse a stored UUID found in column `idx`.
pub fn uuid_from_db(idx: usize, text: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn opt_uuid_from_db(idx: usize, text: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    text.map(|t| uuid_from_db(idx, &t)).transpose()
}

/// Drop sub-millisecond precision so a value compares equal after a store
/// round trip.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
