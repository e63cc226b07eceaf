//! RAII guard for the store lock file.

use crate::error::{RelayError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Exclusive hold on a task store.
///
/// Dropping the guard deletes the lock file. A failed delete is logged and
/// never panics.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    released: bool,
}

impl StoreLock {
    pub(super) fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now and report whether the file could be removed.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| {
            RelayError::UserError(format!(
                "failed to release store lock '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = fs::remove_file(&self.path)
        {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}
