use crate::features::gps::{GpsInfo, get_gps_info};
use crate::features::reader::RawRecord;
use crate::time::resolve_capture_time;
use crate::time::structs::CaptureTime;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions accepted as images, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "heic", "heif"];

pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_supported_image(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    pub path: PathBuf,
    pub gps: GpsInfo,
    pub time: Option<CaptureTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonGeoRecord {
    pub path: PathBuf,
    pub time: Option<CaptureTime>,
}

/// Why a file ended up in the non-image bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum NonImageReason {
    /// The record's file could not be found on disk.
    Missing,
    UnsupportedExtension,
    /// Both converters failed.
    ConversionFailed(String),
    /// The file could not be copied into the archive staging tree.
    CopyFailed(String),
}

impl fmt::Display for NonImageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("file not found"),
            Self::UnsupportedExtension => f.write_str("unsupported extension"),
            Self::ConversionFailed(e) => write!(f, "conversion failed: {e}"),
            Self::CopyFailed(e) => write!(f, "copy failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonImageRecord {
    pub path: PathBuf,
    pub reason: NonImageReason,
}

/// The outcome for one input file. Every record lands in exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedRecord {
    Geotagged(GeoRecord),
    NonGeo(NonGeoRecord),
    NonImage(NonImageRecord),
}

impl ClassifiedRecord {
    pub fn non_image(path: impl Into<PathBuf>, reason: NonImageReason) -> Self {
        Self::NonImage(NonImageRecord {
            path: path.into(),
            reason,
        })
    }
}

/// Classifies a record whose file lives at `resolved_path`.
///
/// Reads nothing but the file's modification time, and only when the capture-time tag
/// is missing or unusable.
pub fn classify(raw: &RawRecord, resolved_path: &Path) -> ClassifiedRecord {
    classify_converted(raw, resolved_path, resolved_path)
}

/// Like [`classify`] for a file converted from `source` to `usable`. The record points
/// at `usable`; the modification-time fallback still reads `source`.
pub fn classify_converted(raw: &RawRecord, source: &Path, usable: &Path) -> ClassifiedRecord {
    if !is_supported_image(usable) {
        return ClassifiedRecord::non_image(usable, NonImageReason::UnsupportedExtension);
    }

    let time = resolve_capture_time(raw.capture_time.as_deref(), source);
    let path = usable.to_path_buf();
    match get_gps_info(raw) {
        Some(gps) => ClassifiedRecord::Geotagged(GeoRecord { path, gps, time }),
        None => ClassifiedRecord::NonGeo(NonGeoRecord { path, time }),
    }
}

/// The three buckets, each in input order.
#[derive(Debug, Default)]
pub struct Buckets {
    pub geotagged: Vec<GeoRecord>,
    pub non_geo: Vec<NonGeoRecord>,
    pub non_image: Vec<NonImageRecord>,
}

impl Buckets {
    pub fn push(&mut self, record: ClassifiedRecord) {
        match record {
            ClassifiedRecord::Geotagged(r) => self.geotagged.push(r),
            ClassifiedRecord::NonGeo(r) => self.non_geo.push(r),
            ClassifiedRecord::NonImage(r) => self.non_image.push(r),
        }
    }

    pub fn len(&self) -> usize {
        self.geotagged.len() + self.non_geo.len() + self.non_image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<ClassifiedRecord> for Buckets {
    fn from_iter<I: IntoIterator<Item = ClassifiedRecord>>(iter: I) -> Self {
        let mut buckets = Self::default();
        for record in iter {
            buckets.push(record);
        }
        buckets
    }
}
