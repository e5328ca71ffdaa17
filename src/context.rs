//! Scratch and staging directories owned by a single run.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use tracing::warn;

/// Subdirectory of the staging root mirrored into the archive's `files/` entries.
pub const ARCHIVE_MEDIA_DIR: &str = "files";

/// The temporary working area of one run.
///
/// Both directories are removed when this value is dropped, whichever way the run
/// ends. [`RunContext::close`] does the same but reports removal failures.
#[derive(Debug)]
pub struct RunContext {
    scratch: TempDir,
    staging: TempDir,
}

impl RunContext {
    /// Creates the scratch and staging directories, inside `base` when given and in
    /// the system temp directory otherwise.
    pub fn acquire(base: Option<&Path>) -> io::Result<Self> {
        let make = |prefix: &str| {
            let mut builder = Builder::new();
            builder.prefix(prefix);
            match base {
                Some(base) => builder.tempdir_in(base),
                None => builder.tempdir(),
            }
        };
        let scratch = make("heicfix_")?;
        let staging = make("kmz_")?;
        std::fs::create_dir_all(staging.path().join(ARCHIVE_MEDIA_DIR))?;
        Ok(Self { scratch, staging })
    }

    /// Where converted images are written.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Root of the tree that becomes the archive.
    pub fn staging_root(&self) -> &Path {
        self.staging.path()
    }

    pub fn media_dir(&self) -> PathBuf {
        self.staging.path().join(ARCHIVE_MEDIA_DIR)
    }

    pub fn close(self) {
        for dir in [self.scratch, self.staging] {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Could not remove working directory {}: {e}", path.display());
            }
        }
    }
}
