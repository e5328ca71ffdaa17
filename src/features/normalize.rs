use crate::features::classify::lowercase_extension;
use crate::features::error::{ConvertError, NormalizationError};
use crate::features::reader::MetadataTool;
use crate::utils::UniqueNames;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Supported encodings that typical viewers can't render and get converted to JPEG.
pub const CONVERTED_EXTENSIONS: [&str; 2] = ["heic", "heif"];

pub fn needs_conversion(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| CONVERTED_EXTENSIONS.contains(&ext.as_str()))
}

/// An external image converter.
pub trait Converter {
    fn name(&self) -> &str;

    /// Writes a readable image for `source` at `destination`.
    fn convert(&self, source: &Path, destination: &Path) -> Result<(), ConvertError>;
}

/// One argument of an external converter command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Literal(String),
    Source,
    Destination,
}

/// A converter run as a child process.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    program: String,
    args: Vec<Arg>,
}

impl ExternalConverter {
    pub fn new(program: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `magick <src> <dst>`
    pub fn imagemagick() -> Self {
        Self::new("magick", vec![Arg::Source, Arg::Destination])
    }

    /// `ffmpeg -y -loglevel error -i <src> <dst>`
    pub fn ffmpeg() -> Self {
        let lit = |s: &str| Arg::Literal(s.to_string());
        Self::new(
            "ffmpeg",
            vec![
                lit("-y"),
                lit("-loglevel"),
                lit("error"),
                lit("-i"),
                Arg::Source,
                Arg::Destination,
            ],
        )
    }

    fn command_args(&self, source: &Path, destination: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| match arg {
                Arg::Literal(s) => OsString::from(s),
                Arg::Source => source.as_os_str().to_owned(),
                Arg::Destination => destination.as_os_str().to_owned(),
            })
            .collect()
    }
}

impl Converter for ExternalConverter {
    fn name(&self) -> &str {
        &self.program
    }

    fn convert(&self, source: &Path, destination: &Path) -> Result<(), ConvertError> {
        let output = Command::new(&self.program)
            .args(self.command_args(source, destination))
            .output()
            .map_err(|source| ConvertError::Unavailable {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ConvertError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !destination.is_file() {
            return Err(ConvertError::MissingOutput {
                program: self.program.clone(),
            });
        }
        Ok(())
    }
}

/// Turns supported-but-unrenderable images into JPEGs inside the scratch area.
pub struct ImageNormalizer {
    primary: Box<dyn Converter>,
    secondary: Box<dyn Converter>,
    names: UniqueNames,
}

impl ImageNormalizer {
    pub fn new(primary: Box<dyn Converter>, secondary: Box<dyn Converter>) -> Self {
        Self {
            primary,
            secondary,
            names: UniqueNames::default(),
        }
    }

    /// Returns a path the package can use for `path`.
    ///
    /// Files that don't need conversion are returned unchanged. Others are converted
    /// into `scratch_dir`, falling back to the secondary converter, and get the
    /// source's metadata copied back on. The source file is never touched.
    pub fn normalize(
        &mut self,
        path: &Path,
        scratch_dir: &Path,
        tags: &mut dyn MetadataTool,
    ) -> Result<PathBuf, NormalizationError> {
        if !needs_conversion(path) {
            return Ok(path.to_path_buf());
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let destination = scratch_dir.join(self.names.claim(&format!("{stem}.jpg")));

        if let Err(primary) = self.primary.convert(path, &destination) {
            debug!(
                "{} failed for {}: {primary}, trying {}",
                self.primary.name(),
                path.display(),
                self.secondary.name()
            );
            if let Err(secondary) = self.secondary.convert(path, &destination) {
                remove_partial(&destination);
                return Err(NormalizationError::Conversion {
                    path: path.to_path_buf(),
                    primary,
                    secondary,
                });
            }
        }

        if let Err(e) = tags.copy_tags(path, &destination) {
            warn!(
                "Converted {} but could not copy its metadata: {e}",
                path.display()
            );
        }
        debug!("Converted {} -> {}", path.display(), destination.display());
        Ok(destination)
    }
}

fn remove_partial(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("Could not remove partial conversion {}: {e}", path.display());
    }
}
