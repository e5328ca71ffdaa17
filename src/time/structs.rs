use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Where a resolved capture time came from.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// The extractor-supplied `DateTimeOriginal` tag.
    DateTimeOriginal,
    /// The file's last-modified time, read as UTC wall-clock time.
    FileModifyDate,
}

/// The capture time of a photo.
///
/// Timestamps are naive: EXIF capture times carry no zone, so everything is compared
/// as wall-clock time.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureTime {
    pub datetime: NaiveDateTime,
    pub source: TimeSource,
}

impl CaptureTime {
    /// ISO 8601 rendering. Fractional seconds, when present, always have six digits.
    pub fn to_iso(&self) -> String {
        let fmt = if self.datetime.nanosecond() == 0 {
            "%Y-%m-%dT%H:%M:%S"
        } else {
            "%Y-%m-%dT%H:%M:%S%.6f"
        };
        self.datetime.format(fmt).to_string()
    }
}
