//! Per-bundle scratch directory.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Scratch directory owned by one bundle's worker.
///
/// [`WorkArea::remove`] deletes it off the async runtime's worker threads.
/// Dropping it without calling `remove` deletes it synchronously, so it is
/// gone on every exit path, cancellation included.
#[derive(Debug)]
pub struct WorkArea {
    bundle_id: String,
    dir: TempDir,
}

impl WorkArea {
    /// Creates a fresh directory for `bundle_id` under `scratch_root`.
    pub fn create(scratch_root: &Path, bundle_id: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", bundle_id))
            .tempdir_in(scratch_root)?;
        debug!("Work area for {} at {}", bundle_id, dir.path().display());
        Ok(Self {
            bundle_id: bundle_id.to_string(),
            dir,
        })
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the work area.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Deletes the directory on the blocking pool.
    pub async fn remove(self) -> std::io::Result<()> {
        let result = tokio::fs::remove_dir_all(self.dir.path()).await;
        if result.is_ok() {
            debug!("Work area for {} removed", self.bundle_id);
        }
        // Dropping `dir` now only cleans up whatever the call above left.
        result
    }
}
