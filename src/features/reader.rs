use crate::features::error::ExtractionError;
use exiftool::ExifTool;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tags requested from the metadata tool, in numeric-coordinate mode.
pub const EXTRACTION_ARGS: [&str; 8] = [
    "-json",
    "-n",
    "-FileName",
    "-SourceFile",
    "-GPSLatitude",
    "-GPSLongitude",
    "-GPSAltitude",
    "-DateTimeOriginal",
];

/// The external metadata tool as seen by the pipeline.
pub trait MetadataTool {
    /// Recursively extracts the fixed tag set for every file below `dir`,
    /// returning the tool's raw JSON output.
    fn extract(&mut self, dir: &Path) -> Result<Vec<u8>, ExtractionError>;

    /// Copies all metadata tags from `source` onto `destination`, in place.
    fn copy_tags(&mut self, source: &Path, destination: &Path) -> Result<(), ExtractionError>;
}

impl MetadataTool for ExifTool {
    fn extract(&mut self, dir: &Path) -> Result<Vec<u8>, ExtractionError> {
        let dir = dir.to_string_lossy();
        let mut args = EXTRACTION_ARGS.to_vec();
        args.extend(["-r", dir.as_ref()]);
        Ok(self.execute_raw(&args)?)
    }

    fn copy_tags(&mut self, source: &Path, destination: &Path) -> Result<(), ExtractionError> {
        let source = source.to_string_lossy();
        let destination = destination.to_string_lossy();
        self.execute_raw(&[
            "-overwrite_original",
            "-tagsFromFile",
            source.as_ref(),
            destination.as_ref(),
        ])?;
        Ok(())
    }
}

/// One metadata extraction result, validated at the reader boundary.
///
/// Coordinates stay as raw JSON values: the tool emits numbers in `-n` mode but can
/// hand back strings for damaged tags, and deciding what is usable is the
/// classifier's job.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: String,
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    pub altitude: Option<Value>,
    pub capture_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExifToolEntry {
    source_file: Option<String>,
    file_name: Option<String>,
    #[serde(rename = "GPSLatitude")]
    gps_latitude: Option<Value>,
    #[serde(rename = "GPSLongitude")]
    gps_longitude: Option<Value>,
    #[serde(rename = "GPSAltitude")]
    gps_altitude: Option<Value>,
    date_time_original: Option<Value>,
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl ExifToolEntry {
    fn into_record(self) -> Option<RawRecord> {
        let source = self
            .source_file
            .filter(|s| !s.is_empty())
            .or(self.file_name.filter(|s| !s.is_empty()))?;
        Some(RawRecord {
            source,
            latitude: non_null(self.gps_latitude),
            longitude: non_null(self.gps_longitude),
            altitude: non_null(self.gps_altitude),
            capture_time: self
                .date_time_original
                .and_then(value_to_string)
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Parses the tool's JSON output into records, in the order the tool listed them.
pub fn parse_records(output: &[u8]) -> Result<Vec<RawRecord>, ExtractionError> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_slice(output)?;
    let Value::Array(entries) = value else {
        return Err(ExtractionError::NotAnArray);
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let entry: ExifToolEntry = serde_json::from_value(entry)?;
        match entry.into_record() {
            Some(record) => records.push(record),
            None => warn!("Metadata record #{index} names no file, skipping it"),
        }
    }
    Ok(records)
}

/// Runs the metadata tool over `dir` and returns one record per file found.
pub fn read_directory(
    tool: &mut dyn MetadataTool,
    dir: &Path,
) -> Result<Vec<RawRecord>, ExtractionError> {
    let output = tool.extract(dir)?;
    let records = parse_records(&output)?;
    debug!("Metadata tool returned {} records", records.len());
    Ok(records)
}

/// Finds the file a record refers to: as given, then joined with `dir`, then the
/// basename joined with `dir`. `None` if none of the candidates exists.
pub fn resolve_source(source: &str, dir: &Path) -> Option<PathBuf> {
    let given = PathBuf::from(source);
    if given.exists() {
        return Some(given);
    }
    if given.is_relative() {
        let joined = dir.join(&given);
        if joined.exists() {
            return Some(joined);
        }
    }
    let basename = dir.join(given.file_name()?);
    basename.exists().then_some(basename)
}
