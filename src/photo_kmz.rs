use crate::PhotoKmzError;
use crate::context::RunContext;
use crate::features::classify::{
    Buckets, ClassifiedRecord, NonImageReason, classify_converted, is_supported_image,
};
use crate::features::error::ExtractionError;
use crate::features::kml::TourOptions;
use crate::features::normalize::{Converter, ExternalConverter, ImageNormalizer};
use crate::features::ordering::order;
use crate::features::package::{
    PackageManifest, PackageOptions, SideFolders, assemble, commit_all, write_side_folders,
};
use crate::features::reader::{MetadataTool, RawRecord, read_directory, resolve_source};
use crate::features::report::{build_rows, report_path, write_report_file};
use crate::structs::RunSummary;
use bon::bon;
use exiftool::ExifTool;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The photo-to-KMZ pipeline.
///
/// Holds the metadata tool, the converters and the package settings. Use the builder
/// to construct an instance:
/// ```rust,no_run
/// # use photo_kmz::{PhotoKmz, PhotoKmzError};
/// # use std::path::Path;
/// # fn main() -> Result<(), PhotoKmzError> {
/// let mut pipeline = PhotoKmz::builder().tour(true).build()?;
/// let summary = pipeline.run(Path::new("photos"), Path::new("out/trip.kmz"))?;
/// println!("{} placemarks", summary.geotagged);
/// # Ok(())
/// # }
/// ```
pub struct PhotoKmz {
    tool: Box<dyn MetadataTool>,
    normalizer: ImageNormalizer,
    options: PackageOptions,
    work_dir: Option<PathBuf>,
}

#[bon]
impl PhotoKmz {
    /// Constructs a `PhotoKmz` via a builder pattern.
    ///
    /// # Builder Arguments
    ///
    /// * `exiftool_path: Option<PathBuf>` - A specific `exiftool` executable. If `None`, `exiftool` is searched for in the system's PATH.
    /// * `metadata_tool: Option<Box<dyn MetadataTool>>` - Replaces exiftool entirely; `exiftool_path` is ignored when set.
    /// * `tour: bool` - (Default: `false`) Emit the animated fly-through.
    /// * `fly_duration_secs: f64` - (Default: `3.0`) Seconds per fly-through waypoint.
    /// * `look_at_range_m: f64` - (Default: `500.0`) Camera distance from each waypoint.
    /// * `side_folders: SideFolders` - (Default: `PerBucket`) Review folders written next to the archive.
    /// * `work_dir: Option<PathBuf>` - Where scratch and staging directories are created. Defaults to the system temp directory.
    /// * `primary_converter` / `secondary_converter` - (Default: ImageMagick, then ffmpeg) Converters for HEIC/HEIF files.
    ///
    /// # Errors
    ///
    /// * [`PhotoKmzError::InvalidTourSetting`]: `fly_duration_secs` or `look_at_range_m` is negative, NaN or infinite.
    /// * [`PhotoKmzError::Extraction`]: the `exiftool` executable cannot be found or fails to start.
    #[builder]
    pub fn new(
        exiftool_path: Option<PathBuf>,
        metadata_tool: Option<Box<dyn MetadataTool>>,
        #[builder(default = false)] tour: bool,
        #[builder(default = 3.0)] fly_duration_secs: f64,
        #[builder(default = 500.0)] look_at_range_m: f64,
        #[builder(default)] side_folders: SideFolders,
        work_dir: Option<PathBuf>,
        primary_converter: Option<Box<dyn Converter>>,
        secondary_converter: Option<Box<dyn Converter>>,
    ) -> Result<Self, PhotoKmzError> {
        for (name, value) in [
            ("fly_duration_secs", fly_duration_secs),
            ("look_at_range_m", look_at_range_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhotoKmzError::InvalidTourSetting { name, value });
            }
        }
        let tool: Box<dyn MetadataTool> = match (metadata_tool, exiftool_path) {
            (Some(tool), _) => tool,
            (None, Some(path)) => {
                Box::new(ExifTool::with_executable(&path).map_err(ExtractionError::from)?)
            }
            (None, None) => Box::new(ExifTool::new().map_err(ExtractionError::from)?),
        };
        let normalizer = ImageNormalizer::new(
            primary_converter.unwrap_or_else(|| Box::new(ExternalConverter::imagemagick())),
            secondary_converter.unwrap_or_else(|| Box::new(ExternalConverter::ffmpeg())),
        );
        let options = PackageOptions {
            tour: tour.then_some(TourOptions {
                fly_duration_secs,
                look_at_range_m,
            }),
            side_folders,
        };
        Ok(Self {
            tool,
            normalizer,
            options,
            work_dir,
        })
    }

    /// Classifies every file below `image_dir` and writes the KMZ archive to
    /// `output_path`, with the CSV report and review folders next to it.
    ///
    /// Per-file problems never fail the run: they move the file into a lower bucket
    /// and show up in the report. The scratch and staging directories are removed on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// * [`PhotoKmzError::InputDirectoryNotFound`]: `image_dir` is not a directory.
    /// * [`PhotoKmzError::Workspace`]: the scratch or staging directory can't be created.
    /// * [`PhotoKmzError::Extraction`]: the metadata tool failed or returned garbage.
    /// * [`PhotoKmzError::PackageWrite`]: the archive or report can't be finalized.
    pub fn run(&mut self, image_dir: &Path, output_path: &Path) -> Result<RunSummary, PhotoKmzError> {
        if !image_dir.is_dir() {
            return Err(PhotoKmzError::InputDirectoryNotFound(image_dir.to_path_buf()));
        }
        let ctx = RunContext::acquire(self.work_dir.as_deref()).map_err(PhotoKmzError::Workspace)?;
        let summary = self.run_in(&ctx, image_dir, output_path)?;
        ctx.close();
        Ok(summary)
    }

    fn classify_record(&mut self, ctx: &RunContext, raw: &RawRecord, image_dir: &Path) -> ClassifiedRecord {
        let Some(resolved) = resolve_source(&raw.source, image_dir) else {
            return ClassifiedRecord::non_image(image_dir.join(&raw.source), NonImageReason::Missing);
        };
        if !is_supported_image(&resolved) {
            return ClassifiedRecord::non_image(resolved, NonImageReason::UnsupportedExtension);
        }
        match self
            .normalizer
            .normalize(&resolved, ctx.scratch_dir(), self.tool.as_mut())
        {
            Ok(usable) => classify_converted(raw, &resolved, &usable),
            Err(e) => {
                warn!("{e}");
                ClassifiedRecord::non_image(resolved, NonImageReason::ConversionFailed(e.to_string()))
            }
        }
    }

    fn run_in(
        &mut self,
        ctx: &RunContext,
        image_dir: &Path,
        output_path: &Path,
    ) -> Result<RunSummary, PhotoKmzError> {
        info!("Reading metadata from {}", image_dir.display());
        let records = read_directory(self.tool.as_mut(), image_dir)?;

        let classified: Vec<ClassifiedRecord> = records
            .iter()
            .map(|raw| self.classify_record(ctx, raw, image_dir))
            .collect();

        // Stage before ordering so a copy failure can't leave a gap in the numbering.
        let mut manifest = PackageManifest::new(ctx.staging_root());
        let buckets: Buckets = classified
            .into_iter()
            .map(|record| match record {
                ClassifiedRecord::Geotagged(geo) => match manifest.stage(&geo) {
                    Ok(_) => ClassifiedRecord::Geotagged(geo),
                    Err(e) => {
                        warn!("Could not stage {}: {e}", geo.path.display());
                        ClassifiedRecord::non_image(geo.path, NonImageReason::CopyFailed(e.to_string()))
                    }
                },
                other => other,
            })
            .collect();
        debug_assert_eq!(buckets.len(), records.len());

        let Buckets {
            geotagged,
            non_geo,
            non_image,
        } = buckets;
        info!(
            "Found {} geotagged images, {} without GPS, {} non-image files",
            geotagged.len(),
            non_geo.len(),
            non_image.len()
        );
        if geotagged.is_empty() {
            warn!("No geotagged images found in {}", image_dir.display());
        }
        for record in &non_image {
            debug!("{}: {}", record.path.display(), record.reason);
        }

        let ordered = order(geotagged);
        debug!("Staged {} files for the archive", manifest.staged_count());

        let archive = assemble(&ordered, &manifest, output_path, &self.options)?;
        let report = report_path(output_path);
        let rows = build_rows(&ordered, &non_geo, &non_image);
        let pending_report = write_report_file(&rows, &report)?;
        commit_all(vec![archive, pending_report])?;
        info!("KMZ created: {}", output_path.display());
        info!("CSV report: {}", report.display());

        let side_folders = write_side_folders(
            output_path,
            self.options.side_folders,
            &ordered,
            &non_geo,
            &non_image,
        );

        Ok(RunSummary {
            archive: output_path.to_path_buf(),
            report,
            geotagged: ordered.len(),
            non_geo: non_geo.len(),
            non_image: non_image.len(),
            side_folders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::error::ConvertError;
    use crate::features::report::ReportStatus;
    use quick_xml::Reader;
    use quick_xml::events::Event;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::fs;
    use std::io::Read;
    use std::rc::Rc;
    use zip::ZipArchive;

    /// Serves a canned extraction result.
    struct FakeTool {
        output: Option<Value>,
    }

    impl MetadataTool for FakeTool {
        fn extract(&mut self, _dir: &Path) -> Result<Vec<u8>, ExtractionError> {
            match &self.output {
                Some(value) => Ok(serde_json::to_vec(value)?),
                None => Err(ExtractionError::NotAnArray),
            }
        }

        fn copy_tags(&mut self, _: &Path, _: &Path) -> Result<(), ExtractionError> {
            Ok(())
        }
    }

    struct BrokenConverter;

    impl Converter for BrokenConverter {
        fn name(&self) -> &str {
            "broken"
        }

        fn convert(&self, _: &Path, _: &Path) -> Result<(), ConvertError> {
            Err(ConvertError::MissingOutput {
                program: "broken".to_string(),
            })
        }
    }

    /// "Converts" by copying the bytes.
    struct CopyingConverter;

    impl Converter for CopyingConverter {
        fn name(&self) -> &str {
            "copy"
        }

        fn convert(&self, source: &Path, destination: &Path) -> Result<(), ConvertError> {
            fs::copy(source, destination)
                .map(|_| ())
                .map_err(|source| ConvertError::Unavailable {
                    program: "copy".to_string(),
                    source,
                })
        }
    }

    /// Serves a canned extraction result and records every metadata copy.
    struct TaggingTool {
        output: Value,
        copies: Rc<RefCell<Vec<(PathBuf, PathBuf)>>>,
    }

    impl MetadataTool for TaggingTool {
        fn extract(&mut self, _dir: &Path) -> Result<Vec<u8>, ExtractionError> {
            Ok(serde_json::to_vec(&self.output)?)
        }

        fn copy_tags(&mut self, source: &Path, destination: &Path) -> Result<(), ExtractionError> {
            self.copies
                .borrow_mut()
                .push((source.to_path_buf(), destination.to_path_buf()));
            Ok(())
        }
    }

    /// The `src` of every `<img>` in the placemark descriptions.
    fn image_hrefs(doc: &str) -> BTreeSet<String> {
        let mut reader = Reader::from_str(doc);
        let mut inside = false;
        let mut hrefs = BTreeSet::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.name().as_ref() == b"description" => inside = true,
                Ok(Event::End(e)) if e.name().as_ref() == b"description" => inside = false,
                Ok(Event::CData(c)) if inside => {
                    let html = String::from_utf8(c.into_inner().into_owned()).unwrap();
                    let src = html.split("src=\"").nth(1).and_then(|rest| rest.split('"').next());
                    hrefs.insert(src.unwrap().to_string());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("doc.kml is not well-formed: {e}"),
            }
        }
        hrefs
    }

    fn media_entries(names: &[String]) -> BTreeSet<String> {
        names
            .iter()
            .filter(|n| n.starts_with("files/"))
            .cloned()
            .collect()
    }

    fn photo(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn pipeline(output: Option<Value>, work_dir: &Path) -> PhotoKmz {
        PhotoKmz::builder()
            .metadata_tool(Box::new(FakeTool { output }))
            .primary_converter(Box::new(BrokenConverter))
            .secondary_converter(Box::new(BrokenConverter))
            .side_folders(SideFolders::None)
            .work_dir(work_dir.to_path_buf())
            .build()
            .unwrap()
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    fn archive_entries(path: &Path) -> (Vec<String>, String) {
        let mut zip = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let names: Vec<String> = zip.file_names().map(str::to_string).collect();
        let mut doc = String::new();
        zip.by_name("doc.kml").unwrap().read_to_string(&mut doc).unwrap();
        (names, doc)
    }

    #[test]
    fn test_three_geotagged_and_one_without_gps() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dir = photos.path();
        let output = json!([
            {"SourceFile": photo(dir, "b.jpg"), "GPSLatitude": 2.0, "GPSLongitude": 20.0,
             "DateTimeOriginal": "2023:01:02 10:00:00"},
            {"SourceFile": photo(dir, "a.jpg"), "GPSLatitude": 1.0, "GPSLongitude": 10.0,
             "DateTimeOriginal": "2023:01:01 10:00:00"},
            {"SourceFile": photo(dir, "c.jpg"), "GPSLatitude": 3.0, "GPSLongitude": 30.0,
             "DateTimeOriginal": "2023:01:03 10:00:00"},
            {"SourceFile": photo(dir, "d.png"), "DateTimeOriginal": "2023:01:04 10:00:00"},
        ]);
        let kmz = out.path().join("trip.kmz");

        let summary = pipeline(Some(output), work.path()).run(dir, &kmz).unwrap();
        assert_eq!((summary.geotagged, summary.non_geo, summary.non_image), (3, 1, 0));
        assert_eq!(summary.report, out.path().join("trip_report.csv"));

        let (names, doc) = archive_entries(&kmz);
        assert_eq!(names[0], "doc.kml");
        let p1 = doc.find("<name>p1</name>").unwrap();
        let p2 = doc.find("<name>p2</name>").unwrap();
        let p3 = doc.find("<name>p3</name>").unwrap();
        assert!(p3 < p2 && p2 < p1);
        let expected: BTreeSet<String> = ["files/a.jpg", "files/b.jpg", "files/c.jpg"]
            .map(String::from)
            .into();
        assert_eq!(media_entries(&names), expected);
        assert_eq!(image_hrefs(&doc), expected);
        assert!(!doc.contains("gx:Tour"));

        let rows = read_csv(&summary.report);
        let status: Vec<_> = rows.iter().map(|r| (r[1].as_str(), r[5].as_str())).collect();
        assert_eq!(
            status,
            [("a.jpg", "OK"), ("b.jpg", "OK"), ("c.jpg", "OK"), ("d.png", "NO_GPS")]
        );
        assert_eq!(rows[0][2], "2023-01-01T10:00:00");

        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_tour_is_written_when_enabled() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let dir = photos.path();
        let output = json!([
            {"SourceFile": photo(dir, "a.jpg"), "GPSLatitude": 1.0, "GPSLongitude": 10.0},
        ]);
        let kmz = dir.join("out").join("images.kmz");

        let mut pipeline = PhotoKmz::builder()
            .metadata_tool(Box::new(FakeTool {
                output: Some(output),
            }))
            .tour(true)
            .fly_duration_secs(1.5)
            .side_folders(SideFolders::None)
            .work_dir(work.path().to_path_buf())
            .build()
            .unwrap();
        pipeline.run(dir, &kmz).unwrap();

        let (_, doc) = archive_entries(&kmz);
        assert!(doc.contains("<gx:Tour>"));
        assert!(doc.contains("<gx:duration>1.5</gx:duration>"));
    }

    #[test]
    fn test_extraction_failure_writes_nothing() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        photo(photos.path(), "a.jpg");
        let kmz = out.path().join("images.kmz");

        let result = pipeline(None, work.path()).run(photos.path(), &kmz);
        assert!(matches!(result, Err(PhotoKmzError::Extraction(_))));
        assert!(!kmz.exists());
        assert!(!out.path().join("images_report.csv").exists());
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_input_directory() {
        let work = tempfile::tempdir().unwrap();
        let missing = work.path().join("nope");
        let result = pipeline(Some(json!([])), work.path()).run(&missing, &work.path().join("x.kmz"));
        assert!(matches!(result, Err(PhotoKmzError::InputDirectoryNotFound(p)) if p == missing));
    }

    #[test]
    fn test_failed_conversion_is_reported_not_fatal() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let dir = photos.path();
        let output = json!([
            {"SourceFile": photo(dir, "1.jpg"), "GPSLatitude": 1.0, "GPSLongitude": 1.0},
            {"SourceFile": photo(dir, "2.jpg"), "GPSLatitude": 2.0, "GPSLongitude": 2.0},
            {"SourceFile": photo(dir, "3.heic"), "GPSLatitude": 3.0, "GPSLongitude": 3.0},
            {"SourceFile": photo(dir, "4.jpeg"), "GPSLatitude": 4.0, "GPSLongitude": 4.0},
            {"SourceFile": photo(dir, "5.png"), "GPSLatitude": 5.0, "GPSLongitude": 5.0},
        ]);
        let kmz = dir.join("images.kmz");

        let summary = pipeline(Some(output), work.path()).run(dir, &kmz).unwrap();
        assert_eq!((summary.geotagged, summary.non_geo, summary.non_image), (4, 0, 1));

        let (names, doc) = archive_entries(&kmz);
        assert_eq!(doc.matches("<Placemark>").count(), 4);
        assert!(!names.iter().any(|n| n.contains("3.")));

        let rows = read_csv(&summary.report);
        assert_eq!(rows.len(), 5);
        let heic = rows.iter().find(|r| r[1] == "3.heic").unwrap();
        assert_eq!(heic[5], ReportStatus::NonImage.as_str());
        let serials: Vec<_> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(serials, ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_converted_heic_is_staged_as_jpeg() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dir = photos.path();
        let heic = photo(dir, "IMG_0001.HEIC");
        let output = json!([
            {"SourceFile": heic, "GPSLatitude": 1.0, "GPSLongitude": 1.0},
            {"SourceFile": photo(dir, "IMG_0002.jpg"), "GPSLatitude": 2.0, "GPSLongitude": 2.0},
        ]);
        let copies = Rc::new(RefCell::new(Vec::new()));
        let kmz = out.path().join("images.kmz");

        let mut pipeline = PhotoKmz::builder()
            .metadata_tool(Box::new(TaggingTool {
                output,
                copies: copies.clone(),
            }))
            .primary_converter(Box::new(CopyingConverter))
            .secondary_converter(Box::new(BrokenConverter))
            .side_folders(SideFolders::None)
            .work_dir(work.path().to_path_buf())
            .build()
            .unwrap();
        let summary = pipeline.run(dir, &kmz).unwrap();
        assert_eq!((summary.geotagged, summary.non_geo, summary.non_image), (2, 0, 0));

        let copies = copies.borrow();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].0, PathBuf::from(&heic));
        assert_eq!(copies[0].1.file_name().unwrap(), "IMG_0001.jpg");

        let (names, doc) = archive_entries(&kmz);
        let expected: BTreeSet<String> = ["files/IMG_0001.jpg", "files/IMG_0002.jpg"]
            .map(String::from)
            .into();
        assert_eq!(media_entries(&names), expected);
        assert_eq!(image_hrefs(&doc), expected);

        let mut zip = ZipArchive::new(fs::File::open(&kmz).unwrap()).unwrap();
        let mut staged = String::new();
        zip.by_name("files/IMG_0001.jpg")
            .unwrap()
            .read_to_string(&mut staged)
            .unwrap();
        assert_eq!(staged, "IMG_0001.HEIC");
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_non_finite_tour_settings_are_rejected() {
        for (duration, range) in [(f64::NAN, 500.0), (3.0, f64::INFINITY), (-1.0, 500.0)] {
            let result = PhotoKmz::builder()
                .metadata_tool(Box::new(FakeTool { output: None }))
                .fly_duration_secs(duration)
                .look_at_range_m(range)
                .build();
            assert!(matches!(result, Err(PhotoKmzError::InvalidTourSetting { .. })));
        }
    }

    #[test]
    fn test_no_geotagged_images_still_produces_an_archive() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let dir = photos.path();
        let output = json!([{"SourceFile": photo(dir, "indoor.jpg")}]);
        let kmz = dir.join("images.kmz");

        let summary = pipeline(Some(output), work.path()).run(dir, &kmz).unwrap();
        assert_eq!(summary.geotagged, 0);
        let (names, doc) = archive_entries(&kmz);
        assert_eq!(names, ["doc.kml"]);
        assert!(!doc.contains("<Placemark>"));
    }

    #[test]
    fn test_side_folders_next_to_the_archive() {
        let photos = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dir = photos.path();
        let output = json!([
            {"SourceFile": photo(dir, "geo.jpg"), "GPSLatitude": 1.0, "GPSLongitude": 1.0},
            {"SourceFile": photo(dir, "plain.jpg")},
            {"SourceFile": photo(dir, "clip.mov")},
        ]);

        let mut pipeline = PhotoKmz::builder()
            .metadata_tool(Box::new(FakeTool {
                output: Some(output),
            }))
            .work_dir(work.path().to_path_buf())
            .build()
            .unwrap();
        let summary = pipeline.run(dir, &out.path().join("images.kmz")).unwrap();

        assert_eq!(summary.side_folders.len(), 3);
        assert!(out.path().join("files_geo/geo.jpg").is_file());
        assert!(out.path().join("files_nongeo/plain.jpg").is_file());
        assert!(out.path().join("files_nonimg/clip.mov").is_file());
    }
}
