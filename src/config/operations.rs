//! Config loading, validation, and path resolution.

use super::model::Config;
use crate::error::{RelayError, Result};
use globset::Glob;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up under the platform config directory.
const CONFIG_FILE: &str = "config.yaml";

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Resolve the config to use.
    ///
    /// An explicit path must exist. Without one, the default location
    /// (`<config_dir>/hostrelay/config.yaml`) is used if present, and
    /// built-in defaults otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Default location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hostrelay").join(CONFIG_FILE))
    }

    /// Parse config from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| RelayError::UserError(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            RelayError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `marker`, `task_store`, `task_extension` must be non-empty
    /// - `task_glob` must be a valid glob
    /// - every deny pattern must compile
    /// - intervals, timeouts, and the strategy list must be non-zero/non-empty
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl AsRef<str>) -> RelayError {
            RelayError::UserError(format!("config validation failed: {}", msg.as_ref()))
        }

        if self.marker.trim().is_empty() {
            return Err(invalid("marker must be non-empty"));
        }
        if self.task_store.trim().is_empty() {
            return Err(invalid("task_store must be non-empty"));
        }
        if self.task_extension.is_empty() || self.task_extension.starts_with('.') {
            return Err(invalid(format!(
                "task_extension must be non-empty and have no leading dot (found '{}')",
                self.task_extension
            )));
        }

        Glob::new(&self.task_glob)
            .map_err(|e| invalid(format!("invalid task_glob '{}': {}", self.task_glob, e)))?;

        for pattern in &self.safety.deny_patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    invalid(format!(
                        "invalid regex in safety.deny_patterns: '{}' - {}\n\
                         Fix: edit config.yaml and correct or remove this pattern.",
                        pattern, e
                    ))
                })?;
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(invalid("watcher.poll_interval_ms must be greater than 0"));
        }
        if self.executor.pop_timeout_ms == 0 {
            return Err(invalid("executor.pop_timeout_ms must be greater than 0"));
        }
        if self.host.probe_timeout_secs == 0 {
            return Err(invalid("host.probe_timeout_secs must be greater than 0"));
        }
        if self.host.wait_poll_secs == 0 {
            return Err(invalid("host.wait_poll_secs must be greater than 0"));
        }

        if self.strategies.is_empty() {
            return Err(invalid(
                "strategies must list at least one execution strategy",
            ));
        }
        for strategy in &self.strategies {
            if strategy.timeout_secs == 0 {
                return Err(invalid(format!(
                    "strategy '{}' timeout_secs must be greater than 0",
                    strategy.display_name()
                )));
            }
        }

        if self.fallback.suffix.is_empty() {
            return Err(invalid("fallback.suffix must be non-empty"));
        }

        Ok(())
    }

    /// The task store directory with a leading `~` expanded.
    pub fn task_store_path(&self) -> PathBuf {
        expand_home(&self.task_store)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.watcher.settle_delay_ms)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.executor.pop_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.executor.shutdown_timeout_ms)
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_home(raw: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (raw.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) if rest.starts_with('/') || rest.starts_with('\\') => {
            home.join(&rest[1..])
        }
        _ => PathBuf::from(raw),
    }
}
