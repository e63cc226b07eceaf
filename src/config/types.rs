//! Configuration section types: watcher, executor, safety, host, strategies.

use serde::{Deserialize, Serialize};

/// Watcher polling and debounce settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Interval between scans of the task store.
    pub poll_interval_ms: u64,

    /// Delay between noticing a change and reading the file.
    pub settle_delay_ms: u64,

    /// Record files already present at startup without dispatching them.
    pub baseline_existing: bool,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            settle_delay_ms: 500,
            baseline_existing: false,
        }
    }
}

/// Executor loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Bounded wait of one queue pop before re-checking the running flag.
    pub pop_timeout_ms: u64,

    /// How long `stop()` waits for each worker thread to finish.
    pub shutdown_timeout_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            pop_timeout_ms: 100,
            shutdown_timeout_ms: 1000,
        }
    }
}

/// Safety filter deny-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    /// Regex patterns, matched case-insensitively against the raw payload.
    pub deny_patterns: Vec<String>,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            deny_patterns: default_deny_patterns(),
        }
    }
}

fn default_deny_patterns() -> Vec<String> {
    [
        r"import\s+os",
        r"import\s+subprocess",
        r"import\s+sys",
        r"exec\s*\(",
        r"eval\s*\(",
        r"__import__\s*\(",
        r"open\s*\(",
        r"file\s*\(",
        r"\.system\s*\(",
        r"\.popen\s*\(",
        r"\.call\s*\(",
        r"globals\s*\(",
        r"locals\s*\(",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Host application identity, install locations, and readiness probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Name the automation bridge addresses the host by.
    pub app_name: String,

    /// Substring matched against running process names and command lines.
    pub process_pattern: String,

    /// Fixed, versioned install locations. When non-empty, at least one must
    /// exist for the host to be considered present.
    pub install_paths: Vec<String>,

    /// Side-effect-free query the host is expected to answer quickly.
    pub version_query: String,

    /// Best-effort command that brings the host to the foreground.
    pub activate_command: String,

    pub probe_timeout_secs: u64,

    /// Ceiling on waiting for an unresponsive host to recover.
    pub wait_ceiling_secs: u64,

    pub wait_poll_secs: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            app_name: "Adobe After Effects 2025".to_string(),
            process_pattern: "Adobe After Effects".to_string(),
            install_paths: [
                "/Applications/Adobe After Effects 2025/Adobe After Effects 2025.app",
                "/Applications/Adobe After Effects 2024/Adobe After Effects 2024.app",
                "/Applications/Adobe After Effects 2023/Adobe After Effects 2023.app",
                "/Applications/Adobe After Effects 2022/Adobe After Effects 2022.app",
                "C:\\Program Files\\Adobe\\Adobe After Effects 2024\\Support Files\\AfterFX.exe",
                "C:\\Program Files\\Adobe\\Adobe After Effects 2023\\Support Files\\AfterFX.exe",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            version_query: r#"osascript -e 'tell application "{app_name}" to get version'"#
                .to_string(),
            activate_command: r#"osascript -e 'tell application "{app_name}" to activate'"#
                .to_string(),
            probe_timeout_secs: 10,
            wait_ceiling_secs: 60,
            wait_poll_secs: 2,
        }
    }
}

/// The concrete mechanism a strategy entry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// External script-runner binary invoked with the script path.
    ScriptRunner,
    /// Scripted UI-automation sequence against the host's window.
    UiAutomation,
    /// The host's own executable with a script-path flag.
    HostCli,
    /// A launcher artifact written beside the task and run through a runner.
    Launcher,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ScriptRunner => "script_runner",
            StrategyKind::UiAutomation => "ui_automation",
            StrategyKind::HostCli => "host_cli",
            StrategyKind::Launcher => "launcher",
        }
    }

    /// Whether this mechanism needs the host already up and responsive.
    ///
    /// UI automation drives the host's menus through the OS and cannot
    /// launch it; the other mechanisms start or activate the host themselves.
    pub fn requires_running_host_by_default(&self) -> bool {
        matches!(self, StrategyKind::UiAutomation)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the ordered strategy chain.
///
/// Fields that do not apply to `kind` are ignored. Empty fields fall back to
/// the kind's built-in defaults when the chain is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,

    /// Display name; defaults to the kind name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_strategy_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides `StrategyKind::requires_running_host_by_default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_running_host: Option<bool>,

    /// Candidate executables (script_runner, host_cli), tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub programs: Vec<String>,

    /// Argument template for script_runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,

    /// Script-path flags for host_cli, tried in order per program.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    /// Automation bridge executable (ui_automation, launcher).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,

    /// Automation script template (ui_automation, launcher).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

pub(crate) fn default_strategy_timeout_secs() -> u64 {
    30
}

impl StrategyConfig {
    /// A config entry for `kind` with every optional field left to defaults.
    pub fn of_kind(kind: StrategyKind) -> Self {
        Self {
            kind,
            name: None,
            timeout_secs: default_strategy_timeout_secs(),
            requires_running_host: None,
            programs: Vec::new(),
            args: None,
            flags: Vec::new(),
            runner: None,
            script: None,
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.kind.as_str().replace('_', "-"))
    }

    pub fn requires_running_host(&self) -> bool {
        self.requires_running_host
            .unwrap_or_else(|| self.kind.requires_running_host_by_default())
    }
}

pub(crate) fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::of_kind(StrategyKind::ScriptRunner),
        StrategyConfig::of_kind(StrategyKind::UiAutomation),
        StrategyConfig::of_kind(StrategyKind::HostCli),
        StrategyConfig::of_kind(StrategyKind::Launcher),
    ]
}

/// Manual fallback artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// Replaces the task file's extension to name the artifact.
    pub suffix: String,

    /// Launcher template; `{payload}` is also available here.
    pub template: String,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            suffix: "_MANUAL_LAUNCHER.scpt".to_string(),
            template: DEFAULT_FALLBACK_TEMPLATE.to_string(),
        }
    }
}

const DEFAULT_FALLBACK_TEMPLATE: &str = r#"-- Manual launcher for task {task_id}
-- Automatic execution failed. Run this file (for example with
-- `osascript "<this file>"` or by opening it in Script Editor), or in
-- {app_name} choose File > Scripts > Run Script File... and pick:
--   {script_path}
--
-- Payload:
{payload}

tell application "{app_name}"
    activate
    delay 3
    do script file (POSIX file "{script_path}")
end tell
"#;
