//! Picks the best available capture time for a file.

use super::parsing::parse_capture_time;
use crate::time::structs::{CaptureTime, TimeSource};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Resolves the capture time of `path`, first success wins:
///
/// 1. the extractor-supplied `DateTimeOriginal` string,
/// 2. the file's last-modified time,
/// 3. `None` when the file can't be inspected.
pub fn resolve_capture_time(date_time_original: Option<&str>, path: &Path) -> Option<CaptureTime> {
    if let Some(raw) = date_time_original {
        match parse_capture_time(raw) {
            Ok(datetime) => {
                return Some(CaptureTime {
                    datetime,
                    source: TimeSource::DateTimeOriginal,
                });
            }
            Err(e) => debug!("{}: {e}, using the file modification time", path.display()),
        }
    }

    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(CaptureTime {
        datetime: DateTime::<Utc>::from(modified).naive_utc(),
        source: TimeSource::FileModifyDate,
    })
}
