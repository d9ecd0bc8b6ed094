//! Staging area for partition payloads.

use dsu_shared::errors::{DsuError, DsuResult};
use std::path::{Path, PathBuf};

/// Suffix of staged partition payloads.
pub const STAGED_SUFFIX: &str = ".img";

/// Local directories the installer touches.
///
/// ```text
/// staging_dir/
/// ├── system.img      (one staged payload per partition being written)
/// └── vendor.img
/// installation_dir    (exists while a previous installation is not discarded)
/// ```
#[derive(Debug, Clone)]
pub struct StagingArea {
    staging_dir: PathBuf,
    installation_dir: PathBuf,
}

impl StagingArea {
    pub fn new(staging_dir: impl Into<PathBuf>, installation_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            installation_dir: installation_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn installation_dir(&self) -> &Path {
        &self.installation_dir
    }

    /// Create the staging directory if missing.
    pub fn prepare(&self) -> DsuResult<()> {
        std::fs::create_dir_all(&self.staging_dir).map_err(|e| {
            DsuError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to create staging dir {}: {}",
                    self.staging_dir.display(),
                    e
                ),
            ))
        })
    }

    /// Path of the staged payload for `partition`.
    pub fn staged_path(&self, partition: &str) -> PathBuf {
        self.staging_dir.join(format!("{}{}", partition, STAGED_SUFFIX))
    }

    /// Whether an earlier installation is still present on disk.
    pub fn has_stale_installation(&self) -> bool {
        self.installation_dir.exists()
    }
}

/// Removes staged payloads left behind by a failed or cancelled run.
///
/// Dropped while armed, it deletes every registered path that still exists.
pub struct StagingGuard {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl StagingGuard {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            armed: true,
        }
    }

    /// Register leftover payloads for cleanup.
    pub fn register(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.paths.extend(paths);
    }

    /// Disarm the guard (call on success).
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Default for StagingGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        for path in self.paths.drain(..) {
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed staged payload"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    "Failed to remove staged payload during cleanup: {}",
                    e
                ),
            }
        }
    }
}
