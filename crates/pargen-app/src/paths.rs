//! Filesystem path helpers (XDG-aware) for the job store and blob storage.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("unable to determine project directories")]
    MissingProjectDirs,
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Container providing filesystem paths for the application. In production this
/// is rooted at `$XDG_DATA_HOME/pargen`; tests construct custom instances.
#[derive(Debug, Clone)]
pub struct AppPaths {
    base_dir: PathBuf,
}

impl AppPaths {
    /// Construct paths rooted under `$XDG_DATA_HOME/pargen`.
    pub fn from_project_dirs() -> Result<Self, PathError> {
        let dirs =
            ProjectDirs::from("dev", "pargen", "pargen").ok_or(PathError::MissingProjectDirs)?;
        Self::new(dirs.data_dir())
    }

    /// Construct paths rooted under the provided directory, ensuring it exists.
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self, PathError> {
        let base = base.as_ref().to_path_buf();
        ensure_dir(&base)?;
        Ok(Self { base_dir: base })
    }

    /// Base data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    /// LMDB environment directory for the report job store (`.../jobs`).
    pub fn jobs_lmdb_dir(&self) -> Result<PathBuf, PathError> {
        self.ensure_child(&["jobs"])
    }

    /// Base directory for blob storage (`.../blobs`).
    pub fn blobs_base_dir(&self) -> Result<PathBuf, PathError> {
        self.ensure_child(&["blobs"])
    }

    fn ensure_child(&self, segments: &[&str]) -> Result<PathBuf, PathError> {
        let mut path = self.base_dir.clone();
        for segment in segments {
            path.push(segment);
        }
        ensure_dir(&path)
    }
}

fn ensure_dir(path: &Path) -> Result<PathBuf, PathError> {
    if let Err(err) = fs::create_dir_all(path) {
        if err.kind() != io::ErrorKind::AlreadyExists {
            return Err(PathError::CreateDir {
                path: path.to_path_buf(),
                source: err,
            });
        }
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_creates_base_dir() {
        let temp = TempDir::new().expect("temp dir");
        let base = temp.path().join("nested").join("data");
        let paths = AppPaths::new(&base).expect("app paths");
        assert!(base.exists());
        assert_eq!(paths.data_dir(), base);
    }

    #[test]
    fn child_dirs_are_created_on_demand() {
        let temp = TempDir::new().expect("temp dir");
        let paths = AppPaths::new(temp.path()).expect("app paths");

        let jobs = paths.jobs_lmdb_dir().expect("jobs dir");
        let blobs = paths.blobs_base_dir().expect("blobs dir");
        assert!(jobs.ends_with("jobs"));
        assert!(blobs.ends_with("blobs"));
        assert!(jobs.exists());
        assert!(blobs.exists());
    }
}
