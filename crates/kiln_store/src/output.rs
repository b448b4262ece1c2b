//! On-disk artifact output management.
//!
//! Artifact identities are destination paths relative to an output root.
//! The store writes artifact bytes (creating parent directories as needed)
//! and deletes outputs when their artifacts are retired or orphaned.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Writes and deletes artifact files under an output root.
pub struct OutputStore {
    /// Root directory all artifact paths are resolved against.
    root: PathBuf,
}

impl OutputStore {
    /// Creates an output store rooted at the given directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns the on-disk path for an artifact identity.
    pub fn path_for(&self, artifact: &Path) -> PathBuf {
        self.root.join(artifact)
    }

    /// Writes artifact bytes to the output root, creating parent
    /// directories as needed.
    pub fn write(&self, artifact: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(artifact);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&path, bytes).map_err(|e| StoreError::Io { path, source: e })
    }

    /// Deletes an artifact file.
    ///
    /// Returns `true` if a file was removed, `false` if it was already
    /// absent. A missing output is not an error: the artifact may never
    /// have been written (for example after a rolled-back write).
    pub fn delete(&self, artifact: &Path) -> Result<bool, StoreError> {
        let path = self.path_for(artifact);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }

    /// Returns `true` if the artifact file exists on disk.
    pub fn exists(&self, artifact: &Path) -> bool {
        self.path_for(artifact).exists()
    }
}
