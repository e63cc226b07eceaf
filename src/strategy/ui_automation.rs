//! Scripted UI automation against the host's window through the OS
//! automation bridge: activate, open the "run script file" dialog, type the
//! path, confirm.

use super::{ExecutionStrategy, StrategyOutcome, task_vars};
use crate::config::StrategyConfig;
use crate::process::run_with_timeout;
use crate::task::Task;
use crate::template::{applescript_escape, render_template};
use std::time::Duration;

const DEFAULT_RUNNER: &str = "osascript";

const DEFAULT_SCRIPT: &str = r#"tell application "{app_name}"
    activate
    delay 1
end tell

tell application "System Events"
    tell process "{app_name}"
        click menu item "Run Script File..." of menu "Scripts" of menu bar 1
        delay 0.5
        keystroke "g" using command down
        delay 0.5
        keystroke "{script_path}"
        delay 0.5
        keystroke return
    end tell
end tell
"#;

#[derive(Debug, Clone)]
pub struct UiAutomation {
    name: String,
    runner: String,
    script: String,
    app_name: String,
    timeout: Duration,
    requires_running_host: bool,
}

impl UiAutomation {
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

    /// The automation script with every value escaped for a string literal.
    pub fn render_script(&self, task: &Task) -> Result<String, String> {
        let escaped = task_vars(task, &self.app_name)
            .into_iter()
            .map(|(k, v)| (k, applescript_escape(&v)))
            .collect();
        render_template(&self.script, &escaped).map_err(|e| e.to_string())
    }
}

impl ExecutionStrategy for UiAutomation {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_running_host(&self) -> bool {
        self.requires_running_host
    }

    fn attempt(&self, task: &Task) -> StrategyOutcome {
        let script = match self.render_script(task) {
            Ok(script) => script,
            Err(e) => return StrategyOutcome::Failed(e),
        };

        let args = vec!["-e".to_string(), script];
        match run_with_timeout(&self.runner, &args, self.timeout) {
            Ok(outcome) => StrategyOutcome::from_process(&self.runner, &outcome),
            Err(e) => StrategyOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use crate::strategy::AttemptStatus;
    use std::path::Path;
    use std::time::SystemTime;

    fn task(path: &str) -> Task {
        Task::from_content(Path::new(path), "// HostRelay".to_string(), SystemTime::now(), "HostRelay").unwrap()
    }

    #[test]
    fn test_requires_running_host_by_default() {
        let ui = UiAutomation::from_config(&StrategyConfig::of_kind(StrategyKind::UiAutomation), "Host");
        assert!(ui.requires_running_host());
        assert_eq!(ui.name(), "ui-automation");
    }

    #[test]
    fn test_render_escapes_quotes_in_path() {
        let ui = UiAutomation::from_config(&StrategyConfig::of_kind(StrategyKind::UiAutomation), "Host \"Beta\"");
        let script = ui.render_script(&task("/store/my \"odd\" dir/relay_1_0001.jsx")).unwrap();

        assert!(script.contains(r#"tell application "Host \"Beta\"""#));
        assert!(script.contains(r#"keystroke "/store/my \"odd\" dir/relay_1_0001.jsx""#));
        assert!(script.contains("Run Script File..."));
    }

    #[test]
    fn test_bad_template_fails_without_running() {
        let mut config = StrategyConfig::of_kind(StrategyKind::UiAutomation);
        config.script = Some("tell {nowhere}".to_string());
        let ui = UiAutomation::from_config(&config, "Host");

        let outcome = ui.attempt(&task("/store/relay_1_0001.jsx"));

        assert_eq!(outcome.status(), AttemptStatus::Failed);
        assert!(outcome.diagnostic().contains("undefined variable 'nowhere'"));
    }

    #[cfg(unix)]
    #[test]
    fn test_bridge_stderr_in_diagnostic() {
        // `sh -e <file>` stands in for `osascript -e <script>`: the rendered
        // "script" is the path of a shell file that fails like the bridge does.
        let temp_dir = tempfile::TempDir::new().unwrap();
        let bridge_script = temp_dir.path().join("bridge.sh");
        std::fs::write(&bridge_script, "echo 'not allowed assistive access' >&2\nexit 1\n").unwrap();

        let mut config = StrategyConfig::of_kind(StrategyKind::UiAutomation);
        config.runner = Some("sh".to_string());
        config.script = Some(bridge_script.to_string_lossy().to_string());
        config.timeout_secs = 5;
        let ui = UiAutomation::from_config(&config, "Host");

        let outcome = ui.attempt(&task("/store/relay_1_0001.jsx"));

        assert_eq!(outcome.status(), AttemptStatus::Failed);
        assert!(outcome.diagnostic().contains("exit code 1"));
        assert!(outcome.diagnostic().contains("not allowed assistive access"));
    }
}
