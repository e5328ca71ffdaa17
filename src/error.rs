use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the photo_kmz crate.
///
/// Only whole-run failures end up here. Per-file problems (conversion, unparsable
/// coordinates, copy failures) are recovered where they happen and show up in the
/// report instead.
#[derive(Error, Debug)]
pub enum PhotoKmzError {
    #[error("Image directory not found: {0}")]
    InputDirectoryNotFound(PathBuf),

    #[error("`{name}` must be a finite, non-negative number, got {value}")]
    InvalidTourSetting { name: &'static str, value: f64 },

    #[error("Could not set up the scratch and staging directories: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Metadata extraction failed: {0}")]
    Extraction(#[from] crate::features::error::ExtractionError),

    #[error("Package could not be written: {0}")]
    PackageWrite(#[from] crate::features::error::PackageWriteError),
}
