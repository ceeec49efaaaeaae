//! ISO-8601 timestamp parsing

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats accepted for timestamps without a zone designator
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp into UTC
///
/// Accepted shapes:
/// - `2024-01-15` (midnight UTC)
/// - `2024-01-15T10:30:00Z` / `2024-01-15T10:30:00.000Z`
/// - `2024-01-15T10:30:00+02:00`
/// - `2024-01-15T10:30:00` (assumed UTC)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let value = raw.trim();

    if value.len() == 10 && !value.contains('T') {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| Error::timestamp(raw));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::timestamp(raw))
}
