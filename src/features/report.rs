//! CSV audit report: one row per input file.

use crate::features::classify::{NonGeoRecord, NonImageRecord};
use crate::features::error::PackageWriteError;
use crate::features::ordering::OrderedPlacemarks;
use crate::features::package::{PendingArtifact, output_dir, output_stem};
use crate::utils::file_name_string;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ReportStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NO_GPS")]
    NoGps,
    #[serde(rename = "NON_IMAGE")]
    NonImage,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoGps => "NO_GPS",
            Self::NonImage => "NON_IMAGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportRow {
    pub slno: usize,
    pub filename: String,
    pub datetime: String,
    pub lat: Option<f64>,
    #[serde(rename = "long")]
    pub lon: Option<f64>,
    pub status: ReportStatus,
}

/// `<dir>/<stem>_report.csv` for an archive at `output_path`.
pub fn report_path(output_path: &Path) -> PathBuf {
    output_dir(output_path).join(format!("{}_report.csv", output_stem(output_path)))
}

/// Builds the rows: geotagged in chronological order (so `slno` is the placemark
/// sequence), then non-geotagged, then non-image, numbered consecutively.
pub fn build_rows(
    ordered: &OrderedPlacemarks,
    non_geo: &[NonGeoRecord],
    non_image: &[NonImageRecord],
) -> Vec<ReportRow> {
    let geo = ordered.chronological().iter().map(|p| {
        let r = &p.record;
        (
            file_name_string(&r.path),
            r.time.map(|t| t.to_iso()),
            Some((r.gps.latitude, r.gps.longitude)),
            ReportStatus::Ok,
        )
    });
    let no_gps = non_geo.iter().map(|r| {
        (
            file_name_string(&r.path),
            r.time.map(|t| t.to_iso()),
            None,
            ReportStatus::NoGps,
        )
    });
    let non_img = non_image
        .iter()
        .map(|r| (file_name_string(&r.path), None, None, ReportStatus::NonImage));

    geo.chain(no_gps)
        .chain(non_img)
        .enumerate()
        .map(|(i, (filename, datetime, coords, status))| ReportRow {
            slno: i + 1,
            filename,
            datetime: datetime.unwrap_or_default(),
            lat: coords.map(|(lat, _)| lat),
            lon: coords.map(|(_, lon)| lon),
            status,
        })
        .collect()
}

/// Writes `rows` as CSV with a header line.
pub fn write_report<W: Write>(rows: &[ReportRow], writer: W) -> Result<(), PackageWriteError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    if rows.is_empty() {
        csv.write_record(["slno", "filename", "datetime", "lat", "long", "status"])?;
    }
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the report to a pending file next to its final location.
pub fn write_report_file(
    rows: &[ReportRow],
    path: &Path,
) -> Result<PendingArtifact, PackageWriteError> {
    let mut pending = PendingArtifact::create(path)?;
    write_report(rows, pending.file_mut())?;
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::classify::{GeoRecord, NonImageReason};
    use crate::features::gps::GpsInfo;
    use crate::features::ordering::order;
    use crate::time::structs::{CaptureTime, TimeSource};
    use chrono::NaiveDate;

    fn at(hour: u32) -> Option<CaptureTime> {
        Some(CaptureTime {
            datetime: NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(hour, 15, 0)
                .unwrap(),
            source: TimeSource::DateTimeOriginal,
        })
    }

    fn geo(name: &str, hour: u32) -> GeoRecord {
        GeoRecord {
            path: PathBuf::from("photos").join(name),
            gps: GpsInfo {
                latitude: 48.25,
                longitude: 16.5,
                altitude: None,
            },
            time: at(hour),
        }
    }

    fn sample_rows() -> Vec<ReportRow> {
        let ordered = order(vec![geo("late.jpg", 18), geo("early.jpg", 9)]);
        let non_geo = vec![NonGeoRecord {
            path: PathBuf::from("photos/indoor.png"),
            time: None,
        }];
        let non_image = vec![NonImageRecord {
            path: PathBuf::from("photos/notes, draft.txt"),
            reason: NonImageReason::UnsupportedExtension,
        }];
        build_rows(&ordered, &non_geo, &non_image)
    }

    #[test]
    fn test_rows_cover_every_bucket_in_order() {
        let rows = sample_rows();
        assert_eq!(rows.len(), 4);

        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.slno, r.filename.as_str(), r.status))
            .collect();
        assert_eq!(
            summary,
            [
                (1, "early.jpg", ReportStatus::Ok),
                (2, "late.jpg", ReportStatus::Ok),
                (3, "indoor.png", ReportStatus::NoGps),
                (4, "notes, draft.txt", ReportStatus::NonImage),
            ]
        );
        assert_eq!(rows[0].datetime, "2024-03-09T09:15:00");
        assert_eq!(rows[0].lat, Some(48.25));
        assert_eq!(rows[2].datetime, "");
        assert_eq!(rows[2].lat, None);
    }

    #[test]
    fn test_csv_output() {
        let mut out = Vec::new();
        write_report(&sample_rows(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "slno,filename,datetime,lat,long,status",
                "1,early.jpg,2024-03-09T09:15:00,48.25,16.5,OK",
                "2,late.jpg,2024-03-09T18:15:00,48.25,16.5,OK",
                "3,indoor.png,,,,NO_GPS",
                "4,\"notes, draft.txt\",,,,NON_IMAGE",
            ]
        );
    }

    #[test]
    fn test_empty_report_still_has_a_header() {
        let mut out = Vec::new();
        write_report(&[], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "slno,filename,datetime,lat,long,status\n"
        );
    }

    #[test]
    fn test_report_path_sits_next_to_the_archive() {
        assert_eq!(
            report_path(Path::new("out/trip.kmz")),
            PathBuf::from("out").join("trip_report.csv")
        );
        assert_eq!(report_path(Path::new("images.kmz")), PathBuf::from("./images_report.csv"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ReportStatus::Ok.as_str(), "OK");
        assert_eq!(ReportStatus::NoGps.as_str(), "NO_GPS");
        assert_eq!(ReportStatus::NonImage.as_str(), "NON_IMAGE");
    }
}
