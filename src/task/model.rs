//! Task record and lifecycle state.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Lifecycle of one task.
///
/// `Discovered -> Queued -> Validating -> Executing -> Succeeded | Failed | ManualFallback`
///
/// The synchronous path skips `Queued`. Screening failures go straight from
/// `Validating` to `Failed`, and tasks still queued when the engine stops go
/// from `Queued` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Discovered,
    Queued,
    Validating,
    Executing,
    Succeeded,
    Failed,
    ManualFallback,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Discovered => "discovered",
            TaskState::Queued => "queued",
            TaskState::Validating => "validating",
            TaskState::Executing => "executing",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::ManualFallback => "manual_fallback",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::ManualFallback
        )
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::{Discovered, Executing, Failed, ManualFallback, Queued, Succeeded, Validating};

        matches!(
            (self, next),
            (Discovered, Queued)
                | (Discovered, Validating)
                | (Queued, Validating)
                | (Queued, Failed)
                | (Validating, Executing)
                | (Validating, Failed)
                | (Executing, Succeeded)
                | (Executing, Failed)
                | (Executing, ManualFallback)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task identifier, derived from the task file's stem.
///
/// Files written by the engine carry `<prefix>_<unix_seconds>_<counter>`, so
/// identifiers sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from a task file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of automation work backed by a file in the task store.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    /// Full file content: payload plus provenance marker and trailer.
    pub payload: String,
    /// Backing file; it persists after the task finishes.
    pub path: PathBuf,
    /// Modification time observed when the task was discovered.
    pub modified: SystemTime,
    state: TaskState,
}

impl Task {
    /// Build a task from file content, or `None` if the provenance marker is
    /// missing (the file is not ours).
    pub fn from_content(
        path: &Path,
        content: String,
        modified: SystemTime,
        marker: &str,
    ) -> Option<Self> {
        if !content.contains(marker) {
            return None;
        }
        let id = TaskId::from_path(path)?;

        Some(Self {
            id,
            payload: content,
            path: path.to_path_buf(),
            modified,
            state: TaskState::Discovered,
        })
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next`, refusing any step the lifecycle does not allow.
    ///
    /// A task in a terminal state can never move again.
    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(RelayError::InvalidTransition {
                task_id: self.id.to_string(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(task_id = %self.id, from = %self.state, to = %next, "task state change");
        self.state = next;
        Ok(())
    }

    /// Path beside the task file with the extension replaced by `suffix`.
    ///
    /// `relay_1_0001.jsx` + `_LAUNCHER.scpt` -> `relay_1_0001_LAUNCHER.scpt`
    pub fn sibling_path(&self, suffix: &str) -> PathBuf {
        let name = format!("{}{}", self.id, suffix);
        match self.path.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// File name for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.to_string())
    }
}
