//! Implementation of `hostrelay run`.
//!
//! Without flags the engine runs in the foreground until the process is
//! interrupted. `--duration` stops it cleanly after a fixed time, and
//! `--once` does a single scan plus queue drain with no threads at all.

use super::print_json;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::engine::{Engine, EngineSettings, Pipeline};
use crate::error::Result;
use crate::executor::DispatchResult;
use crate::exit_codes;
use crate::watcher::ScanReport;
use serde_json::{Value, json};
use std::thread;
use std::time::{Duration, Instant};

const FOREGROUND_TICK: Duration = Duration::from_millis(200);

/// Execute `hostrelay run`.
pub fn cmd_run(config: &Config, args: &RunArgs) -> Result<i32> {
    let pipeline = Pipeline::from_config(config)?;

    if args.once {
        let (report, results) = pipeline.run_once()?;
        print_json(&once_summary(&report, &results))?;
        return Ok(once_exit_code(&results));
    }

    let engine = Engine::start(pipeline, EngineSettings::from_config(config))?;
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    tracing::info!(
        store = %config.task_store_path().display(),
        "watching task store; interrupt to stop"
    );

    while engine.is_running() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(FOREGROUND_TICK);
    }

    let report = engine.stop();
    if !(report.watcher_joined && report.executor_joined) {
        tracing::warn!("a worker was still busy at shutdown and was left to finish");
    }
    Ok(exit_codes::SUCCESS)
}

fn once_summary(report: &ScanReport, results: &[DispatchResult]) -> Value {
    json!({
        "scan": {
            "queued": report.queued,
            "rejected": report.rejected,
            "foreign": report.foreign,
            "unreadable": report.unreadable,
            "unsettled": report.unsettled,
        },
        "results": results,
    })
}

/// First non-zero result code, or success when everything ran.
fn once_exit_code(results: &[DispatchResult]) -> i32 {
    results
        .iter()
        .map(DispatchResult::exit_code)
        .find(|&code| code != exit_codes::SUCCESS)
        .unwrap_or(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::HostStatus;
    use crate::task::TaskId;

    #[test]
    fn test_once_exit_code_prefers_first_failure() {
        let results = vec![
            DispatchResult::succeeded(TaskId::new("a"), "script-runner", HostStatus::Ready, Vec::new()),
            DispatchResult::failed(Some(TaskId::new("b")), "rejected", exit_codes::SAFETY_REJECTED),
            DispatchResult::failed(Some(TaskId::new("c")), "gone", exit_codes::USER_ERROR),
        ];
        assert_eq!(once_exit_code(&results), exit_codes::SAFETY_REJECTED);
        assert_eq!(once_exit_code(&[]), exit_codes::SUCCESS);
    }

    #[test]
    fn test_once_summary_shape() {
        let report = ScanReport {
            queued: vec![TaskId::new("relay_1_0001")],
            foreign: 2,
            ..ScanReport::default()
        };
        let summary = once_summary(&report, &[]);

        assert_eq!(summary["scan"]["queued"][0], "relay_1_0001");
        assert_eq!(summary["scan"]["foreign"], 2);
        assert!(summary["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_run_once_on_empty_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.task_store = dir.path().join("store").display().to_string();

        let args = RunArgs {
            once: true,
            duration: None,
        };
        assert_eq!(cmd_run(&config, &args).unwrap(), exit_codes::SUCCESS);
        assert!(dir.path().join("store").is_dir());
    }
}
