//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the dispatch engine.
///
/// This struct represents the contents of `config.yaml`. Every field has a
/// default, so an empty file is a valid configuration. Unknown fields in the
/// YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Task store
    // =========================================================================
    /// Directory holding one file per task. A leading `~` is expanded.
    pub task_store: String,

    /// Glob selecting task files among the store's top-level entries.
    pub task_glob: String,

    /// Extension used when the engine itself writes a task file.
    pub task_extension: String,

    /// Filename prefix for task files written by the engine.
    pub task_prefix: String,

    /// Provenance marker; files without it are not ours and are ignored.
    pub marker: String,

    // =========================================================================
    // Pipeline
    // =========================================================================
    pub watcher: WatcherSettings,

    pub executor: ExecutorSettings,

    pub safety: SafetySettings,

    // =========================================================================
    // Host and execution
    // =========================================================================
    pub host: HostSettings,

    /// Ordered strategy chain; list order is the priority rank.
    pub strategies: Vec<StrategyConfig>,

    pub fallback: FallbackSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            task_store: "~/Documents/HostRelay Scripts".to_string(),
            task_glob: "*.jsx".to_string(),
            task_extension: "jsx".to_string(),
            task_prefix: "relay".to_string(),
            marker: "HostRelay".to_string(),
            watcher: WatcherSettings::default(),
            executor: ExecutorSettings::default(),
            safety: SafetySettings::default(),
            host: HostSettings::default(),
            strategies: default_strategies(),
            fallback: FallbackSettings::default(),
        }
    }
}
