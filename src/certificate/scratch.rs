//! Per-run scratch directory.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use super::CertificateError;

/// Unique scratch directory under the configured root, removed on close or drop.
#[derive(Debug)]
pub struct ScratchScope {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchScope {
    pub fn create(root: &Path, run_id: Uuid) -> Result<Self, CertificateError> {
        std::fs::create_dir_all(root).map_err(|e| CertificateError::write(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{run_id}-"))
            .tempdir_in(root)
            .map_err(|e| CertificateError::write(root, e))?;
        let path = dir.path().to_path_buf();
        log::debug!("[{}] scratch directory {}", run_id, path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory, reporting failure.
    pub fn close(mut self) -> Result<(), CertificateError> {
        match self.dir.take() {
            Some(dir) => dir.close().map_err(|source| CertificateError::Cleanup {
                path: self.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchScope {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                log::warn!(
                    "Failed to remove scratch directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
