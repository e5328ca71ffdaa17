//! Utility functions for parsing capture-time strings into chrono types.

use crate::features::error::ParseError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Date-time formats tried in order. The first three are what cameras and exiftool
/// write; the rest cover generic ISO 8601 renderings.
const DATETIME_FORMATS: [&str; 5] = [
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 2] = ["%Y:%m:%d", "%Y-%m-%d"];

/// Parses an original-capture timestamp.
///
/// Date-only values resolve to midnight. Values with a UTC offset keep their local
/// wall-clock time so they compare consistently with zone-less EXIF times.
pub fn parse_capture_time(s: &str) -> Result<NaiveDateTime, ParseError> {
    let s = s.trim();

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt)
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(dt);
        }
    }

    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S%z"))
        .map(|dt| dt.naive_local())
        .map_err(|_| ParseError::Timestamp(s.to_string()))
}
