//! The task store: a directory holding one file per task.
//!
//! Producers submit work by writing a file here; the watcher only ever reads.
//! Layout:
//!
//! ```text
//! <task_store>/
//!   relay_1760781234_0001.jsx              task file (marker + payload)
//!   relay_1760781234_0001_LAUNCHER.scpt    launcher strategy artifact
//!   relay_1760781234_0001_MANUAL_LAUNCHER.scpt  manual fallback artifact
//!   direct/                                synchronous tasks, never watched
//!   .hostrelay/events.ndjson               audit log
//! ```

use super::model::Task;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::fs::atomic_create_new;
use crate::safety::DenyList;
use chrono::{Local, Utc};
use globset::{Glob, GlobMatcher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Subdirectory for tasks dispatched through the synchronous path.
const DIRECT_DIR: &str = "direct";

/// Subdirectory for engine state (audit log).
const STATE_DIR: &str = ".hostrelay";

/// Upper bound on name probing when identifiers collide.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Per-process counter appended to the timestamp in generated file names.
static TASK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A task file seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Handle on the task store directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
    matcher: GlobMatcher,
    marker: String,
    extension: String,
    prefix: String,
}

impl TaskStore {
    pub fn new(
        root: impl Into<PathBuf>,
        glob: &str,
        marker: impl Into<String>,
        extension: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        let matcher = Glob::new(glob)
            .map_err(|e| RelayError::UserError(format!("invalid task glob '{}': {}", glob, e)))?
            .compile_matcher();

        Ok(Self {
            root: root.into(),
            matcher,
            marker: marker.into(),
            extension: extension.into(),
            prefix: prefix.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.task_store_path(),
            &config.task_glob,
            config.marker.clone(),
            config.task_extension.clone(),
            config.task_prefix.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn direct_dir(&self) -> PathBuf {
        self.root.join(DIRECT_DIR)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Create the store directory if it is missing.
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            RelayError::UserError(format!(
                "failed to create task store '{}': {}",
                self.root.display(),
                e
            ))
        })
    }

    /// Whether `path` names a task file (by glob, ignoring hidden files).
    pub fn is_task_file(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if !name.starts_with('.') => self.matcher.is_match(name),
            _ => false,
        }
    }

    /// Enumerate top-level task files with their modification times.
    ///
    /// A missing or unreadable store is treated as empty. Entries whose
    /// metadata cannot be read are skipped with a warning.
    pub fn list_task_files(&self) -> Vec<StoreEntry> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.root.display(), "task store missing; treating as empty");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to list task store");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read task store entry");
                    continue;
                }
            };

            let path = entry.path();
            if !self.is_task_file(&path) {
                continue;
            }

            match entry.metadata().and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => files.push(StoreEntry { path, modified }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to stat task file; skipping");
                }
            }
        }

        files
    }

    /// Read a task file.
    ///
    /// Returns `Ok(None)` when the provenance marker is absent.
    pub fn load(&self, path: &Path) -> Result<Option<Task>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::UserError(format!(
                "failed to read task file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| {
                RelayError::UserError(format!(
                    "failed to stat task file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Task::from_content(path, content, modified, &self.marker))
    }

    /// Submit a task: screen the payload, then write it into the store where
    /// the watcher will pick it up.
    pub fn submit(&self, deny: &DenyList, payload: &str) -> Result<PathBuf> {
        deny.screen(payload).into_result()?;
        self.write_task(&self.root, payload)
    }

    /// Write a task into the `direct/` subdirectory, which the watcher never
    /// scans. The caller is responsible for screening.
    pub fn write_direct(&self, payload: &str) -> Result<PathBuf> {
        self.write_task(&self.direct_dir(), payload)
    }

    /// Full task file content: marker header, payload, completion trailer.
    pub fn render_task_file(&self, payload: &str) -> String {
        format!(
            "// {marker} task\n\
             // Generated at: {generated}\n\
             \n\
             {payload}\n\
             \n\
             // Log completion\n\
             $.writeln(\"{marker} task completed\");\n",
            marker = self.marker,
            generated = Local::now().format("%Y-%m-%d %H:%M:%S"),
            payload = payload.trim_end(),
        )
    }

    fn write_task(&self, dir: &Path, payload: &str) -> Result<PathBuf> {
        let content = self.render_task_file(payload);
        let timestamp = Utc::now().timestamp();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let counter = TASK_COUNTER.fetch_add(1, Ordering::Relaxed);
            let name = format!(
                "{}_{}_{:04}.{}",
                self.prefix, timestamp, counter, self.extension
            );
            let path = dir.join(name);

            if atomic_create_new(&path, &content)? {
                tracing::info!(path = %path.display(), "task file written");
                return Ok(path);
            }
            tracing::debug!(path = %path.display(), "task name taken; trying next counter");
        }

        Err(RelayError::UserError(format!(
            "could not find a free task file name in '{}'",
            dir.display()
        )))
    }
}
