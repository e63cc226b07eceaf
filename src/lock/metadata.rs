//! Contents of the store lock file.

use crate::error::{RelayError, Result};
use crate::events::{get_actor_string, host_name};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use sysinfo::{Pid, System};

/// Who holds the lock, written as JSON into the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    /// `user@HOST` of the holder.
    pub owner: String,

    /// Machine the holder runs on; a pid only means something there.
    pub host: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    pub created_at: DateTime<Utc>,

    /// What the holder is doing (`run`, `run --once`, `execute`).
    pub action: String,
}

impl LockMetadata {
    /// Metadata for this process, stamped now.
    pub fn new(action: &str) -> Self {
        Self {
            owner: get_actor_string(),
            host: host_name(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
            action: action.to_string(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RelayError::UserError(format!(
                "failed to read lock file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            RelayError::UserError(format!(
                "failed to parse lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RelayError::UserError(format!("failed to serialize lock metadata: {}", e)))
    }

    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Age as a short human-readable string (`3m`, `2h 5m`, `1d 4h`).
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    /// The holder was on this machine and its process is gone.
    ///
    /// A lock from another host, or one without a pid, is never stale.
    pub fn is_stale(&self) -> bool {
        match self.pid {
            Some(pid) if self.host == host_name() => !process_alive(pid),
            _ => false,
        }
    }
}

fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let mut system = System::new();
    system.refresh_process(Pid::from_u32(pid))
}
