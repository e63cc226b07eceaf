//! Launcher artifact: a small automation-bridge script written beside the
//! task file that activates the host and tells it to run the task. The
//! strategy writes it, then runs it through the bridge. If the run fails the
//! file stays on disk, so a human can still open it.

use super::{ExecutionStrategy, StrategyOutcome, task_vars};
use crate::config::StrategyConfig;
use crate::fs::atomic_write_file;
use crate::process::run_with_timeout;
use crate::task::Task;
use crate::template::{applescript_escape, render_template};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_RUNNER: &str = "osascript";

/// Suffix replacing the task file's extension.
pub const LAUNCHER_SUFFIX: &str = "_LAUNCHER.scpt";

const DEFAULT_SCRIPT: &str = r#"tell application "{app_name}"
    activate
    delay 1
    do script file (POSIX file "{script_path}")
end tell
"#;

#[derive(Debug, Clone)]
pub struct Launcher {
    name: String,
    runner: String,
    script: String,
    app_name: String,
    timeout: Duration,
    requires_running_host: bool,
}

impl Launcher {
    pub fn from_config(config: &StrategyConfig, app_name: &str) -> Self {
        Self {
            name: config.display_name(),
            runner: config
                .runner
                .clone()
                .unwrap_or_else(|| DEFAULT_RUNNER.to_string()),
            script: config
                .script
                .clone()
                .unwrap_or_else(|| DEFAULT_SCRIPT.to_string()),
            app_name: app_name.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            requires_running_host: config.requires_running_host(),
        }
    }

    fn write_launcher(&self, task: &Task) -> Result<PathBuf, String> {
        let escaped = task_vars(task, &self.app_name)
            .into_iter()
            .map(|(k, v)| (k, applescript_escape(&v)))
            .collect();
        let content = render_template(&self.script, &escaped).map_err(|e| e.to_string())?;

        let path = task.sibling_path(LAUNCHER_SUFFIX);
        atomic_write_file(&path, &content).map_err(|e| e.to_string())?;
        tracing::debug!(task_id = %task.id, path = %path.display(), "launcher written");
        Ok(path)
    }
}

impl ExecutionStrategy for Launcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_running_host(&self) -> bool {
        self.requires_running_host
    }

    fn attempt(&self, task: &Task) -> StrategyOutcome {
        let path = match self.write_launcher(task) {
            Ok(path) => path,
            Err(e) => return StrategyOutcome::Failed(format!("could not write launcher: {}", e)),
        };

        let args = vec![path.to_string_lossy().to_string()];
        match run_with_timeout(&self.runner, &args, self.timeout) {
            Ok(outcome) => StrategyOutcome::from_process(&self.runner, &outcome),
            Err(e) => StrategyOutcome::Failed(e.to_string()),
        }
    }
}
