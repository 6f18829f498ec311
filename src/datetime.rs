//! Date/time storage helpers.
//!
//! Timestamps are persisted as fixed-width UTC text so that string
//! comparison in SQL matches chronological order.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::{MailError, Result};

/// Format a timestamp for storage (`2024-05-01T12:00:00.000000Z`).
pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// Accepts the storage format and any RFC3339 value, plus the plain
/// SQLite `datetime('now')` format for rows written by hand.
pub fn parse_db_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| MailError::Integrity(format!("invalid timestamp {s:?}: {e}")))
}
