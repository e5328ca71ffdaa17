use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Exiftool failed to execute or process the directory")]
    Exiftool(#[from] exiftool::ExifToolError),

    #[error("Exiftool returned output that is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Exiftool JSON output is not an array of records")]
    NotAnArray,
}

/// Failure of a single external image converter.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Converter `{program}` could not be started: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Converter `{program}` reported success but wrote no output")]
    MissingOutput { program: String },
}

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("Could not convert {path}: primary: {primary}; secondary: {secondary}")]
    Conversion {
        path: PathBuf,
        primary: ConvertError,
        secondary: ConvertError,
    },

    #[error("I/O error while preparing conversion of {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Unusable field values. Never fatal: coordinates demote a record to non-geotagged,
/// timestamps fall back to the file modification time.
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Coordinate value {0} is not a finite number")]
    Coordinate(String),

    #[error("Timestamp {0:?} does not match any accepted format")]
    Timestamp(String),
}

#[derive(Error, Debug)]
pub enum PackageWriteError {
    #[error("Could not create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while writing the package: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not walk the staging tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Could not write the archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Could not write the report: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not move {path} into place: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
