//! Files owned by the pipeline under the media root.
//!
//! ```text
//! <media_root>/temp/<uuid>.<ext>          uploaded inputs, removed by the job
//! <media_root>/reports/Report_<uuid>.pdf  report artifacts
//! ```
//!
//! History records store report locations relative to the media root.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::error::StorageError;

pub const TEMP_DIR: &str = "temp";
pub const REPORTS_DIR: &str = "reports";

/// A report written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReport {
    /// `reports/Report_<uuid>.pdf`, as stored in the history record.
    pub pointer: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes `content` to a new file that must not exist yet.
    fn create_new(&self, path: &Path, content: &[u8]) -> Result<(), StorageError> {
        let write_err = |e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        };
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(write_err)?;
        file.write_all(content).map_err(write_err)?;
        Ok(())
    }

    /// Stores an uploaded input under a random name with `extension`.
    pub fn write_temp(&self, content: &[u8], extension: &str) -> Result<PathBuf, StorageError> {
        let dir = self.temp_dir();
        self.ensure_directory(&dir)?;

        let path = dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        self.create_new(&path, content)?;
        Ok(path)
    }

    /// Stores a rendered report under a collision-resistant name.
    pub fn write_report(&self, content: &[u8]) -> Result<StoredReport, StorageError> {
        let dir = self.reports_dir();
        self.ensure_directory(&dir)?;

        let name = format!("Report_{}.pdf", Uuid::new_v4());
        let path = dir.join(&name);
        self.create_new(&path, content)?;

        Ok(StoredReport {
            pointer: format!("{}/{}", REPORTS_DIR, name),
            path,
        })
    }

    /// Turns a stored relative pointer into a path under the root.
    ///
    /// Absolute pointers and pointers with `..` are rejected.
    pub fn resolve(&self, pointer: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(pointer);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if pointer.is_empty() || escapes {
            return Err(StorageError::OutsideRoot(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }

    /// Removes a file. Returns false when it was already gone.
    pub fn remove(&self, path: &Path) -> Result<bool, StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Removes every file left in the temp area. Only safe while no job is
    /// queued or running. Returns how many files were removed.
    pub fn clear_temp(&self) -> Result<usize, StorageError> {
        let dir = self.temp_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::ReadDirectory { path: dir, source: e }),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::ReadDirectory {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file() && self.remove(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
