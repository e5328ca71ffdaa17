//! Archive staging and KMZ writing.

use crate::context::ARCHIVE_MEDIA_DIR;
use crate::features::classify::{GeoRecord, NonGeoRecord, NonImageRecord};
use crate::features::error::PackageWriteError;
use crate::features::kml::{TourOptions, render_kml};
use crate::features::ordering::OrderedPlacemarks;
use crate::utils::{UniqueNames, file_name_string, list_files_relative, to_archive_path};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the root document inside the archive.
pub const ROOT_DOCUMENT: &str = "doc.kml";

/// Which operator-review folders are written next to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum SideFolders {
    /// `files_geo`, `files_nongeo` and `files_nonimg`.
    #[default]
    PerBucket,
    /// A single `no_gps` folder with the images that have no usable location.
    NoGps,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    /// Emit the fly-through when set.
    pub tour: Option<TourOptions>,
    pub side_folders: SideFolders,
}

/// Files staged for the archive and the names they got.
#[derive(Debug)]
pub struct PackageManifest {
    staging_root: PathBuf,
    names: UniqueNames,
    hrefs: HashMap<PathBuf, String>,
}

impl PackageManifest {
    pub fn new(staging_root: &Path) -> Self {
        Self {
            staging_root: staging_root.to_path_buf(),
            names: UniqueNames::default(),
            hrefs: HashMap::new(),
        }
    }

    /// Copies a geotagged record's file under `files/` and returns its archive path.
    /// Staging the same file twice returns the first path.
    pub fn stage(&mut self, record: &GeoRecord) -> io::Result<String> {
        if let Some(href) = self.hrefs.get(&record.path) {
            return Ok(href.clone());
        }
        let name = self.names.claim(&file_name_string(&record.path));
        let destination = self.staging_root.join(ARCHIVE_MEDIA_DIR).join(&name);
        fs::copy(&record.path, &destination)?;

        let href = to_archive_path(&Path::new(ARCHIVE_MEDIA_DIR).join(&name));
        debug!("Staged {} as {href}", record.path.display());
        self.hrefs.insert(record.path.clone(), href.clone());
        Ok(href)
    }

    pub fn href(&self, path: &Path) -> Option<&str> {
        self.hrefs.get(path).map(String::as_str)
    }

    pub fn staged_count(&self) -> usize {
        self.hrefs.len()
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }
}

/// An output file written next to its final location, moved into place by
/// [`commit_all`]. Dropping it removes the temporary file.
#[derive(Debug)]
pub struct PendingArtifact {
    file: NamedTempFile,
    target: PathBuf,
}

impl PendingArtifact {
    pub fn create(target: &Path) -> Result<Self, PackageWriteError> {
        let dir = output_dir(target);
        let file = tempfile::Builder::new()
            .prefix(".photo_kmz_")
            .suffix(".part")
            .tempfile_in(&dir)?;
        Ok(Self {
            file,
            target: target.to_path_buf(),
        })
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    fn persist(self) -> Result<PathBuf, PackageWriteError> {
        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|e| PackageWriteError::Persist {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(target)
    }
}

/// An artifact moved into place, with the file it replaced set aside.
struct Committed {
    target: PathBuf,
    previous: Option<PathBuf>,
}

fn set_aside_path(target: &Path) -> PathBuf {
    output_dir(target).join(format!(".photo_kmz_prev_{}", file_name_string(target)))
}

/// Renames an existing file at `target` out of the way and returns where it went.
fn set_aside(target: &Path) -> Result<Option<PathBuf>, PackageWriteError> {
    if !target.is_file() {
        return Ok(None);
    }
    let previous = set_aside_path(target);
    fs::rename(target, &previous).map_err(|source| PackageWriteError::Persist {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(Some(previous))
}

fn restore(previous: &Path, target: &Path) {
    if let Err(e) = fs::rename(previous, target) {
        warn!("Could not restore {} from {}: {e}", target.display(), previous.display());
    }
}

fn roll_back(committed: &[Committed]) {
    for c in committed.iter().rev() {
        if let Err(e) = fs::remove_file(&c.target) {
            warn!("Could not remove {}: {e}", c.target.display());
        }
        if let Some(previous) = &c.previous {
            restore(previous, &c.target);
        }
    }
}

/// Moves every artifact into place. Files already at the targets are set aside first.
/// If any step fails, the artifacts already moved are removed and the files they
/// replaced are put back, so a failed commit leaves the previous outputs as they were.
pub fn commit_all(artifacts: Vec<PendingArtifact>) -> Result<Vec<PathBuf>, PackageWriteError> {
    let mut committed: Vec<Committed> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let previous = match set_aside(&artifact.target) {
            Ok(previous) => previous,
            Err(e) => {
                roll_back(&committed);
                return Err(e);
            }
        };
        let target = artifact.target.clone();
        match artifact.persist() {
            Ok(target) => committed.push(Committed { target, previous }),
            Err(e) => {
                if let Some(previous) = &previous {
                    restore(previous, &target);
                }
                roll_back(&committed);
                return Err(e);
            }
        }
    }

    for c in &committed {
        if let Some(previous) = &c.previous
            && let Err(e) = fs::remove_file(previous)
        {
            warn!("Could not remove {}: {e}", previous.display());
        }
    }
    Ok(committed.into_iter().map(|c| c.target).collect())
}

pub fn output_dir(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// The output file stem, used as document name and report prefix.
pub fn output_stem(output_path: &Path) -> String {
    output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "images".to_string())
}

pub fn ensure_output_dir(output_path: &Path) -> Result<PathBuf, PackageWriteError> {
    let dir = output_dir(output_path);
    fs::create_dir_all(&dir).map_err(|source| PackageWriteError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

/// Writes `markup` as the root entry followed by every staged file, deflated.
fn write_archive(
    archive: &mut PendingArtifact,
    markup: &str,
    staging_root: &Path,
) -> Result<usize, PackageWriteError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(archive.file_mut());

    zip.start_file(ROOT_DOCUMENT, options)?;
    zip.write_all(markup.as_bytes())?;

    let entries = list_files_relative(staging_root)?;
    for relative in &entries {
        zip.start_file(to_archive_path(relative), options)?;
        let mut source = File::open(staging_root.join(relative))?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?.flush()?;
    Ok(entries.len())
}

/// Renders the document and writes the archive to a pending file next to
/// `output_path`. Nothing is visible at `output_path` until it is committed.
pub fn assemble(
    ordered: &OrderedPlacemarks,
    manifest: &PackageManifest,
    output_path: &Path,
    options: &PackageOptions,
) -> Result<PendingArtifact, PackageWriteError> {
    ensure_output_dir(output_path)?;

    let markup = render_kml(
        &output_stem(output_path),
        ordered,
        |p| match manifest.href(&p.record.path) {
            Some(href) => href.to_string(),
            None => {
                warn!("{} was never staged", p.record.path.display());
                format!("{ARCHIVE_MEDIA_DIR}/{}", file_name_string(&p.record.path))
            }
        },
        options.tour.as_ref(),
    );

    let mut archive = PendingArtifact::create(output_path)?;
    let media = write_archive(&mut archive, &markup, manifest.staging_root())?;
    debug!(
        "Wrote {} placemarks and {media} media entries for {}",
        ordered.len(),
        output_path.display()
    );
    Ok(archive)
}

fn copy_into(dir: &Path, names: &mut UniqueNames, source: &Path) {
    if !source.is_file() {
        return;
    }
    let destination = dir.join(names.claim(&file_name_string(source)));
    if let Err(e) = fs::copy(source, &destination) {
        warn!("Could not copy {} to {}: {e}", source.display(), dir.display());
    }
}

fn fill_folder<'a>(dir: PathBuf, sources: impl Iterator<Item = &'a Path>) -> Option<PathBuf> {
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!("Could not create {}: {e}", dir.display());
        return None;
    }
    let mut names = UniqueNames::default();
    for source in sources {
        copy_into(&dir, &mut names, source);
    }
    Some(dir)
}

/// Copies the classified files into review folders next to the archive.
/// Best effort: failures are logged and skipped.
pub fn write_side_folders(
    output_path: &Path,
    layout: SideFolders,
    ordered: &OrderedPlacemarks,
    non_geo: &[NonGeoRecord],
    non_image: &[NonImageRecord],
) -> Vec<PathBuf> {
    let dir = output_dir(output_path);
    let non_geo_paths = || non_geo.iter().map(|r| r.path.as_path());
    match layout {
        SideFolders::PerBucket => [
            fill_folder(
                dir.join("files_geo"),
                ordered.chronological().iter().map(|p| p.record.path.as_path()),
            ),
            fill_folder(dir.join("files_nongeo"), non_geo_paths()),
            fill_folder(
                dir.join("files_nonimg"),
                non_image.iter().map(|r| r.path.as_path()),
            ),
        ]
        .into_iter()
        .flatten()
        .collect(),
        SideFolders::NoGps => fill_folder(dir.join("no_gps"), non_geo_paths())
            .into_iter()
            .collect(),
        SideFolders::None => Vec::new(),
    }
}
