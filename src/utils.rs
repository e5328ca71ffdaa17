use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Recursively lists all files below `dir` as paths relative to `dir`, sorted by
/// name so archive entry order is deterministic.
/// I/O errors encountered during traversal are propagated.
pub fn list_files_relative(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry_result| match entry_result {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry
                .path()
                .strip_prefix(dir)
                .map_or_else(|_| entry.path().to_path_buf(), Path::to_path_buf))),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

/// Joins the normal components of a relative path with `/`, whatever the host
/// separator is.
pub fn to_archive_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Hands out file names that are unique within one directory: `a.jpg`, then
/// `a_1.jpg`, `a_2.jpg` and so on.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn claim(&mut self, file_name: &str) -> String {
        let lowered = |s: &str| s.to_lowercase();
        if self.taken.insert(lowered(file_name)) {
            return file_name.to_string();
        }

        let path = Path::new(file_name);
        let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or(file_name);
        let ext = path.extension().and_then(OsStr::to_str);
        (1..)
            .map(|n| match ext {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            })
            .find(|candidate| self.taken.insert(lowered(candidate)))
            .unwrap_or_else(|| file_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_nested_files_relative_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("files/sub")).unwrap();
        fs::write(dir.path().join("files/b.jpg"), b"b").unwrap();
        fs::write(dir.path().join("files/a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("files/sub/c.png"), b"c").unwrap();

        let files = list_files_relative(&dir.path().join("files")).unwrap();
        assert_eq!(
            files,
            [
                PathBuf::from("a.jpg"),
                PathBuf::from("b.jpg"),
                PathBuf::from("sub").join("c.png")
            ]
        );
    }

    #[test]
    fn test_archive_paths_use_forward_slashes() {
        let relative = PathBuf::from("files").join("sub").join("c.png");
        assert_eq!(to_archive_path(&relative), "files/sub/c.png");
        assert_eq!(to_archive_path(Path::new("./files/a.jpg")), "files/a.jpg");
    }

    #[test]
    fn test_unique_names() {
        let mut names = UniqueNames::default();
        assert_eq!(names.claim("a.jpg"), "a.jpg");
        assert_eq!(names.claim("a.jpg"), "a_1.jpg");
        assert_eq!(names.claim("A.JPG"), "A_2.JPG");
        assert_eq!(names.claim("a_1.jpg"), "a_1_1.jpg");
        assert_eq!(names.claim("README"), "README");
        assert_eq!(names.claim("README"), "README_1");
    }
}
