use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunSummary {
    pub archive: PathBuf,
    pub report: PathBuf,
    pub geotagged: usize,
    pub non_geo: usize,
    pub non_image: usize,
    pub side_folders: Vec<PathBuf>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.geotagged + self.non_geo + self.non_image
    }
}
