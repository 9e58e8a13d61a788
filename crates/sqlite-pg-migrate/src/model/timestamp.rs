//! Audit timestamp normalization.
//!
//! SQLite stores `created_at`/`updated_at` as free-form text. Every value is
//! turned into a UTC instant when the record is built; values that are
//! already instants pass through unchanged, so normalizing twice is a no-op.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::RawValue;

/// Text layouts carrying an explicit offset (`+00`, `+03:00`, `Z`).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f %#z",
    "%Y/%m/%d %H:%M:%S%.f%#z",
];

/// Text layouts without an offset; read as UTC wall-clock.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// Date-only layouts; midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a textual date/time expression into a UTC instant.
///
/// Returns `None` when no supported layout matches.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Normalize a raw column value into a UTC instant.
///
/// Integers are Unix epoch seconds. The error is a human-readable reason,
/// wrapped into a malformed-row error by the caller.
pub fn normalize_timestamp(value: &RawValue) -> std::result::Result<DateTime<Utc>, String> {
    match value {
        RawValue::Timestamp(ts) => Ok(*ts),
        RawValue::Text(text) => {
            parse_timestamp(text).ok_or_else(|| format!("unrecognised timestamp '{}'", text))
        }
        RawValue::Integer(secs) => Utc
            .timestamp_opt(*secs, 0)
            .single()
            .ok_or_else(|| format!("epoch seconds {} out of range", secs)),
        other => Err(format!("expected timestamp, got {}", other.kind_name())),
    }
}
