//! The host's own executable invoked with a script-path flag.
//!
//! Hosts disagree on the flag name across versions, so every configured flag
//! is tried against every installed executable until one exits cleanly.

use super::{AttemptBudget, ExecutionStrategy, StrategyOutcome, program_available};
use crate::config::StrategyConfig;
use crate::process::run_with_timeout;
use crate::task::Task;
use std::time::Duration;

fn default_programs() -> Vec<String> {
    [
        "/Applications/Adobe After Effects 2025/Adobe After Effects 2025.app/Contents/MacOS/After Effects",
        "/Applications/Adobe After Effects 2024/Adobe After Effects 2024.app/Contents/MacOS/After Effects",
        "C:\\Program Files\\Adobe\\Adobe After Effects 2024\\Support Files\\AfterFX.exe",
        "C:\\Program Files\\Adobe\\Adobe After Effects 2023\\Support Files\\AfterFX.exe",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_flags() -> Vec<String> {
    ["-script", "-s", "-run"].into_iter().map(String::from).collect()
}

#[derive(Debug, Clone)]
pub struct HostCli {
    name: String,
    programs: Vec<String>,
    flags: Vec<String>,
    timeout: Duration,
    requires_running_host: bool,
}

impl HostCli {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            name: config.display_name(),
            programs: if config.programs.is_empty() {
                default_programs()
            } else {
                config.programs.clone()
            },
            flags: if config.flags.is_empty() {
                default_flags()
            } else {
                config.flags.clone()
            },
            timeout: Duration::from_secs(config.timeout_secs),
            requires_running_host: config.requires_running_host(),
        }
    }
}

impl ExecutionStrategy for HostCli {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_running_host(&self) -> bool {
        self.requires_running_host
    }

    fn attempt(&self, task: &Task) -> StrategyOutcome {
        let script_path = task.path.to_string_lossy().to_string();
        let budget = AttemptBudget::start(self.timeout);
        let mut tried = 0;
        let mut last = None;

        for program in self.programs.iter().filter(|p| program_available(p)) {
            for flag in &self.flags {
                let Some(left) = budget.remaining() else {
                    return budget.spent(last.as_slice());
                };
                tried += 1;
                let args = vec![flag.clone(), script_path.clone()];
                tracing::debug!(strategy = %self.name, program = %program, flag = %flag, "trying host executable");

                match run_with_timeout(program, &args, left) {
                    Ok(outcome) if outcome.is_success() => {
                        return StrategyOutcome::Succeeded(format!("ran via {} {}", program, flag));
                    }
                    Ok(outcome) => {
                        last = Some(StrategyOutcome::from_process(&format!("{} {}", program, flag), &outcome));
                    }
                    // The executable itself cannot be started; other flags won't help.
                    Err(e) => {
                        last = Some(StrategyOutcome::Failed(e.to_string()));
                        break;
                    }
                }
            }
        }

        match last {
            None => StrategyOutcome::Failed(format!(
                "no host executable found (checked {} location(s))",
                self.programs.len()
            )),
            Some(outcome) if tried == 1 => outcome,
            Some(outcome) if budget.remaining().is_none() => budget.spent(&[outcome]),
            Some(outcome) => StrategyOutcome::Failed(format!(
                "{} invocation(s) failed; last: {}",
                tried,
                outcome.diagnostic()
            )),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use crate::strategy::AttemptStatus;
    use std::path::Path;
    use std::time::{Instant, SystemTime};
    use tempfile::TempDir;

    fn task(path: &Path) -> Task {
        Task::from_content(path, "// HostRelay".to_string(), SystemTime::now(), "HostRelay").unwrap()
    }

    fn host_cli(programs: &[&str], flags: &[&str]) -> HostCli {
        let mut config = StrategyConfig::of_kind(StrategyKind::HostCli);
        config.programs = programs.iter().map(|p| p.to_string()).collect();
        config.flags = flags.iter().map(|f| f.to_string()).collect();
        config.timeout_secs = 5;
        HostCli::from_config(&config)
    }

    #[test]
    fn test_default_flags() {
        let cli = HostCli::from_config(&StrategyConfig::of_kind(StrategyKind::HostCli));
        assert_eq!(cli.flags, vec!["-script", "-s", "-run"]);
        assert_eq!(cli.name(), "host-cli");
        assert!(!cli.requires_running_host());
    }

    #[test]
    fn test_no_host_installed() {
        let cli = host_cli(&["/nonexistent/hostrelay/AfterFX"], &["-r"]);
        let outcome = cli.attempt(&task(Path::new("/store/relay_1_0001.jsx")));

        assert_eq!(outcome.status(), AttemptStatus::Failed);
        assert!(outcome.diagnostic().contains("no host executable found"));
    }

    #[test]
    fn test_flag_invocations() {
        // `sh <flag> <path>` runs the task file as a shell script.
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("relay_1_0001.jsx");
        std::fs::write(&script, "# HostRelay\nexit 0\n").unwrap();
        let missing = temp_dir.path().join("missing.jsx");

        let cli = host_cli(&["sh"], &["-e"]);
        assert!(cli.attempt(&task(&script)).is_success());

        let cli = host_cli(&["sh"], &["-e", "-x"]);
        let outcome = cli.attempt(&task(&missing));
        assert_eq!(outcome.status(), AttemptStatus::Failed);
        assert!(outcome.diagnostic().starts_with("2 invocation(s) failed"));
    }

    #[test]
    fn test_flags_share_one_timeout() {
        // `sh -c <script_path>` runs the path as a command; make it a sleep.
        let mut config = StrategyConfig::of_kind(StrategyKind::HostCli);
        config.programs = vec!["sh".to_string()];
        config.flags = vec!["-c".to_string(), "-c".to_string(), "-c".to_string()];
        config.timeout_secs = 1;
        let cli = HostCli::from_config(&config);

        let start = Instant::now();
        let outcome = cli.attempt(&task(Path::new("sleep 5")));

        assert!(start.elapsed() < Duration::from_millis(2500), "took {:?}", start.elapsed());
        assert_eq!(outcome.status(), AttemptStatus::TimedOut);
    }
}
