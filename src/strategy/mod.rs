//! Execution strategies: the mechanisms that get the host to run a task.
//!
//! Each strategy wraps one way of delivering a task file to the host. The
//! executor walks an ordered chain of them and stops at the first success.
//! Strategies never panic and never return `Err`: every failure, including a
//! missing binary or a timeout, becomes a `StrategyOutcome` with a
//! diagnostic so the chain can advance.

mod chain;
mod host_cli;
mod launcher;
mod script_runner;
mod ui_automation;

pub use chain::build_chain;
pub use host_cli::HostCli;
pub use launcher::Launcher;
pub use script_runner::ScriptRunner;
pub use ui_automation::UiAutomation;

use crate::config::expand_home;
use crate::process::ProcessOutcome;
use crate::task::Task;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Succeeded(String),
    Failed(String),
    /// Treated exactly like `Failed` for chain advancement.
    TimedOut(String),
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StrategyOutcome::Succeeded(_))
    }

    pub fn diagnostic(&self) -> &str {
        match self {
            StrategyOutcome::Succeeded(d) | StrategyOutcome::Failed(d) | StrategyOutcome::TimedOut(d) => d,
        }
    }

    pub fn status(&self) -> AttemptStatus {
        match self {
            StrategyOutcome::Succeeded(_) => AttemptStatus::Succeeded,
            StrategyOutcome::Failed(_) => AttemptStatus::Failed,
            StrategyOutcome::TimedOut(_) => AttemptStatus::TimedOut,
        }
    }

    /// Classify a finished external command.
    pub fn from_process(what: &str, outcome: &ProcessOutcome) -> Self {
        if outcome.is_success() {
            StrategyOutcome::Succeeded(format!("{} completed", what))
        } else if outcome.timed_out {
            StrategyOutcome::TimedOut(format!("{}: {}", what, outcome.summary()))
        } else {
            StrategyOutcome::Failed(format!("{}: {}", what, outcome.summary()))
        }
    }
}

/// Status of an attempt, as recorded in results and the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    TimedOut,
    /// Not tried because the host was not ready and the strategy needs it.
    Skipped,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::Failed => "failed",
            AttemptStatus::TimedOut => "timed_out",
            AttemptStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One mechanism for getting the host to run a task file.
pub trait ExecutionStrategy: Send {
    fn name(&self) -> &str;

    /// Whether this strategy can only work against an already responsive
    /// host. Strategies that start or activate the host return `false`.
    fn requires_running_host(&self) -> bool;

    /// Try once to run `task`. Must return within the strategy's timeout.
    fn attempt(&self, task: &Task) -> StrategyOutcome;
}

/// Wall-clock budget for one `attempt`, shared by every candidate program
/// or flag it tries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptBudget {
    total: Duration,
    deadline: Instant,
}

impl AttemptBudget {
    pub(crate) fn start(total: Duration) -> Self {
        Self {
            total,
            deadline: Instant::now() + total,
        }
    }

    /// Time left, or `None` once the budget is spent.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    /// Outcome for an attempt that ran out of time; `so_far` lists what
    /// the tried candidates reported.
    pub(crate) fn spent(&self, so_far: &[StrategyOutcome]) -> StrategyOutcome {
        let mut message = format!("{}s attempt budget spent", self.total.as_secs());
        if !so_far.is_empty() {
            message.push_str(": ");
            message.push_str(&join_diagnostics(so_far));
        }
        StrategyOutcome::TimedOut(message)
    }
}

pub(crate) fn join_diagnostics(outcomes: &[StrategyOutcome]) -> String {
    outcomes
        .iter()
        .map(StrategyOutcome::diagnostic)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Template variables available to strategy commands for `task`.
pub(crate) fn task_vars(task: &Task, app_name: &str) -> HashMap<String, String> {
    crate::template::vars([
        ("script_path", task.path.to_string_lossy().to_string()),
        ("app_name", app_name.to_string()),
        ("task_id", task.id.to_string()),
    ])
}

/// Whether a configured program can be tried.
///
/// Bare command names are left to `PATH` lookup; anything that looks like a
/// path must exist on disk.
pub(crate) fn program_available(program: &str) -> bool {
    if program.contains('/') || program.contains('\\') {
        expand_home(program).exists()
    } else {
        !program.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(exit_code: Option<i32>, timed_out: bool, stderr: &str) -> ProcessOutcome {
        ProcessOutcome {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::from_secs(30),
            timed_out,
        }
    }

    #[test]
    fn test_outcome_from_process() {
        assert!(StrategyOutcome::from_process("runner", &process(Some(0), false, "")).is_success());

        let failed = StrategyOutcome::from_process("runner", &process(Some(2), false, "no such menu"));
        assert_eq!(failed.status(), AttemptStatus::Failed);
        assert_eq!(failed.diagnostic(), "runner: exit code 2: no such menu");

        let timed_out = StrategyOutcome::from_process("runner", &process(None, true, ""));
        assert_eq!(timed_out.status(), AttemptStatus::TimedOut);
        assert!(!timed_out.is_success());
    }

    #[test]
    fn test_spent_budget_reports_timeout_with_history() {
        let budget = AttemptBudget::start(Duration::ZERO);
        assert!(budget.remaining().is_none());

        let spent = budget.spent(&[StrategyOutcome::TimedOut("sh: timed out".to_string())]);
        assert_eq!(spent.status(), AttemptStatus::TimedOut);
        assert_eq!(spent.diagnostic(), "0s attempt budget spent: sh: timed out");

        assert!(AttemptBudget::start(Duration::from_secs(60)).remaining().is_some());
    }

    #[test]
    fn test_program_available() {
        assert!(program_available("osascript"));
        assert!(!program_available(""));
        assert!(!program_available("/nonexistent/hostrelay/runner"));
        assert!(program_available(env!("CARGO_MANIFEST_DIR")));
    }
}
