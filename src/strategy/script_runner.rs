//! External script-runner binary (an IDE-style toolkit) invoked with the
//! task file path.

use super::{AttemptBudget, ExecutionStrategy, StrategyOutcome, join_diagnostics, program_available, task_vars};
use crate::config::StrategyConfig;
use crate::process::run_with_timeout;
use crate::task::Task;
use crate::template::render_command;
use std::time::Duration;

const DEFAULT_ARGS: &str = "-run {script_path}";

fn default_programs() -> Vec<String> {
    [
        "/Applications/Adobe ExtendScript Toolkit CC/ExtendScript Toolkit.app/Contents/MacOS/ExtendScript Toolkit",
        "/Applications/Adobe ExtendScript Toolkit CS6/ExtendScript Toolkit.app/Contents/MacOS/ExtendScript Toolkit",
        "C:\\Program Files (x86)\\Adobe\\Adobe ExtendScript Toolkit CC\\ExtendScript Toolkit.exe",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    name: String,
    programs: Vec<String>,
    args: String,
    app_name: String,
    timeout: Duration,
    requires_running_host: bool,
}

impl ScriptRunner {
    pub fn from_config(config: &StrategyConfig, app_name: &str) -> Self {
        let programs = if config.programs.is_empty() {
            default_programs()
        } else {
            config.programs.clone()
        };

        Self {
            name: config.display_name(),
            programs,
            args: config.args.clone().unwrap_or_else(|| DEFAULT_ARGS.to_string()),
            app_name: app_name.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            requires_running_host: config.requires_running_host(),
        }
    }
}

impl ExecutionStrategy for ScriptRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_running_host(&self) -> bool {
        self.requires_running_host
    }

    fn attempt(&self, task: &Task) -> StrategyOutcome {
        let args = match render_command(&self.args, &task_vars(task, &self.app_name)) {
            Ok(args) => args,
            Err(e) => return StrategyOutcome::Failed(e.to_string()),
        };

        let budget = AttemptBudget::start(self.timeout);
        let mut failures = Vec::new();
        for program in self.programs.iter().filter(|p| program_available(p)) {
            let Some(left) = budget.remaining() else {
                return budget.spent(&failures);
            };
            tracing::debug!(strategy = %self.name, program = %program, "trying script runner");
            match run_with_timeout(program, &args, left) {
                Ok(outcome) if outcome.is_success() => {
                    return StrategyOutcome::Succeeded(format!("ran via {}", program));
                }
                Ok(outcome) => failures.push(StrategyOutcome::from_process(program, &outcome)),
                Err(e) => failures.push(StrategyOutcome::Failed(e.to_string())),
            }
        }

        match failures.len() {
            0 => StrategyOutcome::Failed(format!(
                "no script runner found (checked {} location(s))",
                self.programs.len()
            )),
            // A single candidate keeps its own classification (timeout stays timeout).
            1 => failures.remove(0),
            _ if budget.remaining().is_none() => budget.spent(&failures),
            _ => StrategyOutcome::Failed(join_diagnostics(&failures)),
        }
    }
}
