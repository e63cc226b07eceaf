//! Append-only audit log of task lifecycle events.
//!
//! Events are stored in NDJSON format (one JSON object per line) in
//! `<task_store>/.hostrelay/events.ndjson`. The log is a record of what the
//! engine did, not a source of state: nothing is ever read back from it to
//! decide what to dispatch.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`discovered`, `queued`, `strategy_attempt`, ...)
//! - `actor`: `user@HOST` of the engine process
//! - `task`: task identifier, when the event concerns one task
//! - `details`: freeform object with action-specific details
//!
//! # Failure Policy
//!
//! `AuditLog::record` never fails: an unwritable log is reported through
//! `tracing` and the task carries on. Use `append` when the caller needs to
//! know.

use crate::error::{RelayError, Result};
use crate::task::TaskStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const EVENTS_FILE: &str = "events.ndjson";

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Engine started watching the store.
    Start,
    /// Engine stopped.
    Stop,
    /// The watcher found a new or changed task file.
    Discovered,
    /// A task was pushed onto the dispatch queue.
    Queued,
    /// A payload matched the deny-list.
    SafetyRejected,
    /// One strategy in the chain was tried (or skipped).
    StrategyAttempt,
    /// A strategy ran the task.
    Succeeded,
    /// The task ended without running and without a fallback.
    Failed,
    /// Every strategy failed; a manual launcher was written.
    ManualFallback,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Start => write!(f, "start"),
            EventAction::Stop => write!(f, "stop"),
            EventAction::Discovered => write!(f, "discovered"),
            EventAction::Queued => write!(f, "queued"),
            EventAction::SafetyRejected => write!(f, "safety_rejected"),
            EventAction::StrategyAttempt => write!(f, "strategy_attempt"),
            EventAction::Succeeded => write!(f, "succeeded"),
            EventAction::Failed => write!(f, "failed"),
            EventAction::ManualFallback => write!(f, "manual_fallback"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    pub action: EventAction,

    /// The engine process owner (e.g., `user@HOST`).
    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task = Some(task_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            RelayError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Get the actor string (`user@HOST`) for event and lock metadata.
pub(crate) fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host_name())
}

pub(crate) fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Handle on one events file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The audit log kept in the store's state directory.
    pub fn for_store(store: &TaskStore) -> Self {
        Self::new(store.state_dir().join(EVENTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event, logging instead of failing.
    pub fn record(&self, event: Event) {
        if let Err(e) = self.append(&event) {
            tracing::warn!(action = %event.action, error = %e, "failed to write audit event");
        }
    }

    /// Append an event as a single JSON line, creating the file and its
    /// directory if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                RelayError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                RelayError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            RelayError::UserError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Read every event back, skipping lines that do not parse.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RelayError::UserError(format!(
                    "failed to read events file '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
