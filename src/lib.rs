//! # Photo KMZ
//!
//! Turn a folder of photos into a Google Earth KMZ package.
//!
//! This crate reads GPS and capture-time metadata for every file in a directory tree
//! (via `exiftool`), places each geotagged image on the map as a numbered placemark
//! and bundles the images with the KML document into a single archive.
//!
//! ## Key Features
//!
//! - **Classification**: Every file ends up geotagged, without GPS, or not an image, and stays accounted for.
//! - **Chronological Placemarks**: Placemarks are numbered `p1..pN` by capture time, falling back to the file modification time.
//! - **HEIC/HEIF Support**: Images typical viewers can't render are converted to JPEG with ImageMagick or ffmpeg, metadata included.
//! - **Fly-through Tour**: An optional `gx:Tour` visiting each placemark in order.
//! - **Audit Report**: A CSV next to the archive with one row per input file.
//! - **Review Folders**: Copies of each bucket's files for manual inspection.
//!
//! ## Usage
//!
//! Build a [`PhotoKmz`] and call [`PhotoKmz::run`] with the photo directory and the archive path.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use photo_kmz::PhotoKmz;
//!
//! fn main() -> color_eyre::Result<()> {
//!     let mut pipeline = PhotoKmz::builder().tour(true).build()?;
//!     let summary = pipeline.run(Path::new("photos"), Path::new("trip.kmz"))?;
//!
//!     println!("Placemarks: {}", summary.geotagged);
//!     println!("Report: {}", summary.report.display());
//!
//!     Ok(())
//! }
//! ```

pub mod context;
mod error;
pub mod features;
pub mod photo_kmz;
pub mod structs;
pub mod time;
pub mod utils;

pub use error::PhotoKmzError;
pub use features::kml::TourOptions;
pub use features::normalize::{Converter, ExternalConverter};
pub use features::package::SideFolders;
pub use features::reader::MetadataTool;
pub use photo_kmz::PhotoKmz;
pub use structs::RunSummary;
