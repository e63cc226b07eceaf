//! Cross-process exclusion for a task store.
//!
//! Only one process may dispatch from a store at a time: a running engine,
//! a `run --once` pass, or an `--execute` call. Each takes
//! `<store>/.hostrelay/engine.lock` for as long as it dispatches. The file is
//! created with **create_new** semantics, so acquisition is atomic, and it is
//! removed by the `StoreLock` guard when dropped.
//!
//! The lock file holds JSON metadata (`owner`, `host`, `pid`, `created_at`,
//! `action`). A lock left behind by a crashed process on this machine is
//! detected through its pid and reclaimed once.

mod guard;
mod metadata;


pub use guard::StoreLock;
pub use metadata::LockMetadata;

use crate::error::{RelayError, Result};
use crate::task::TaskStore;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "engine.lock";

/// Path of the lock file for `store`.
pub fn lock_path(store: &TaskStore) -> PathBuf {
    store.state_dir().join(LOCK_FILE)
}

/// Take the store lock for `action`.
///
/// Fails with `StoreLocked` while another live process holds it.
pub fn acquire(store: &TaskStore, action: &str) -> Result<StoreLock> {
    let path = lock_path(store);
    let metadata = LockMetadata::new(action);

    match try_create(&path, &metadata)? {
        Some(lock) => Ok(lock),
        None => {
            let holder = LockMetadata::from_file(&path).ok();
            if let Some(holder) = holder.as_ref().filter(|h| h.is_stale()) {
                tracing::warn!(
                    lock = %path.display(),
                    pid = ?holder.pid,
                    action = %holder.action,
                    "removing store lock left by a process that no longer exists"
                );
                remove_stale(&path)?;
                if let Some(lock) = try_create(&path, &metadata)? {
                    return Ok(lock);
                }
            }
            Err(held_error(store, &path))
        }
    }
}

/// Create the lock file, or `None` if it already exists.
fn try_create(path: &Path, metadata: &LockMetadata) -> Result<Option<StoreLock>> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            RelayError::UserError(format!(
                "failed to create state directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(RelayError::UserError(format!(
                "failed to acquire store lock '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let json = metadata.to_json()?;
    file.write_all(json.as_bytes()).map_err(|e| {
        let _ = fs::remove_file(path);
        RelayError::UserError(format!("failed to write lock metadata: {}", e))
    })?;
    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        RelayError::UserError(format!("failed to sync lock file: {}", e))
    })?;

    Ok(Some(StoreLock::new(path.to_path_buf())))
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Someone else cleaned it up first.
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RelayError::UserError(format!(
            "failed to remove stale store lock '{}': {}",
            path.display(),
            e
        ))),
    }
}

fn held_error(store: &TaskStore, path: &Path) -> RelayError {
    let holder = match LockMetadata::from_file(path) {
        Ok(meta) => format!(
            "{} (pid {}, action '{}', started {} ago)",
            meta.owner,
            meta.pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string()),
            meta.action,
            meta.age_string()
        ),
        Err(_) => "an unknown process".to_string(),
    };

    RelayError::StoreLocked(format!(
        "task store '{}' is in use by another hostrelay process: {}\n\
         Stop that process, or use `hostrelay submit` to queue work for it. \
         If no such process exists, delete '{}'.",
        store.root().display(),
        holder,
        path.display()
    ))
}
