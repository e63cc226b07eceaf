//! Structured outcome of dispatching one task.

use crate::exit_codes;
use crate::probe::HostStatus;
use crate::strategy::{AttemptStatus, StrategyOutcome};
use crate::task::{TaskId, TaskState};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// One step of the strategy chain as it actually ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub strategy: String,
    pub status: AttemptStatus,
    pub diagnostic: String,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    pub fn from_outcome(strategy: &str, outcome: &StrategyOutcome, elapsed: Duration) -> Self {
        Self {
            strategy: strategy.to_string(),
            status: outcome.status(),
            diagnostic: outcome.diagnostic().to_string(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn skipped(strategy: &str, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.to_string(),
            status: AttemptStatus::Skipped,
            diagnostic: reason.into(),
            elapsed_ms: 0,
        }
    }

    /// Whether the strategy was actually invoked.
    pub fn was_invoked(&self) -> bool {
        self.status != AttemptStatus::Skipped
    }
}

/// Result object returned to synchronous callers and printed by
/// `--execute`.
///
/// ```json
/// {"success": false, "message": "...", "artifactPath": "/store/relay_..._MANUAL_LAUNCHER.scpt",
///  "usedStrategy": null, "taskId": "relay_...", "state": "manual_fallback", "attempts": [...]}
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Terminal state, or `None` when no task was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_status: Option<HostStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip)]
    exit_code: i32,
}

impl DispatchResult {
    pub fn succeeded(task_id: TaskId, strategy: &str, host_status: HostStatus, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            success: true,
            message: format!("task {} executed via {}", task_id, strategy),
            artifact_path: None,
            used_strategy: Some(strategy.to_string()),
            task_id: Some(task_id),
            state: Some(TaskState::Succeeded),
            host_status: Some(host_status),
            attempts,
            exit_code: exit_codes::SUCCESS,
        }
    }

    pub fn manual_fallback(
        task_id: TaskId,
        artifact: PathBuf,
        message: String,
        host_status: HostStatus,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            success: false,
            message,
            artifact_path: Some(artifact),
            used_strategy: None,
            task_id: Some(task_id),
            state: Some(TaskState::ManualFallback),
            host_status: Some(host_status),
            attempts,
            exit_code: exit_codes::EXECUTION_FAILURE,
        }
    }

    /// A task that ended `Failed`, or a request rejected before any task
    /// existed (`task_id` is `None`).
    pub fn failed(task_id: Option<TaskId>, message: impl Into<String>, exit_code: i32) -> Self {
        let state = task_id.as_ref().map(|_| TaskState::Failed);
        Self {
            success: false,
            message: message.into(),
            artifact_path: None,
            used_strategy: None,
            task_id,
            state,
            host_status: None,
            attempts: Vec::new(),
            exit_code,
        }
    }

    pub fn with_attempts(mut self, host_status: HostStatus, attempts: Vec<AttemptRecord>) -> Self {
        self.host_status = Some(host_status);
        self.attempts = attempts;
        self
    }

    /// Process exit code for this outcome; non-zero whenever `success` is false.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Names of the strategies that were actually invoked, in order.
    pub fn invoked_strategies(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| a.was_invoked())
            .map(|a| a.strategy.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_json_shape() {
        let result = DispatchResult::succeeded(
            TaskId::new("relay_1_0001"),
            "script-runner",
            HostStatus::Ready,
            vec![AttemptRecord::from_outcome(
                "script-runner",
                &StrategyOutcome::Succeeded("ran".to_string()),
                Duration::from_millis(12),
            )],
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["usedStrategy"], "script-runner");
        assert_eq!(json["taskId"], "relay_1_0001");
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["hostStatus"], "ready");
        assert_eq!(json["attempts"][0]["elapsedMs"], 12);
        assert!(json.get("artifactPath").is_none());
        assert!(json.get("exitCode").is_none());
        assert_eq!(result.exit_code(), exit_codes::SUCCESS);
    }

    #[test]
    fn test_rejected_before_task_exists() {
        let result = DispatchResult::failed(None, "blocked", exit_codes::SAFETY_REJECTED);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success"], false);
        assert!(json.get("taskId").is_none());
        assert!(json.get("state").is_none());
        assert_eq!(result.exit_code(), exit_codes::SAFETY_REJECTED);
    }

    #[test]
    fn test_invoked_strategies_excludes_skipped() {
        let result = DispatchResult::failed(Some(TaskId::new("t")), "x", exit_codes::EXECUTION_FAILURE)
            .with_attempts(
                HostStatus::NotRunning,
                vec![
                    AttemptRecord::skipped("ui-automation", "host not ready"),
                    AttemptRecord::from_outcome(
                        "host-cli",
                        &StrategyOutcome::TimedOut("slow".to_string()),
                        Duration::from_secs(30),
                    ),
                ],
            );

        assert_eq!(result.invoked_strategies(), vec!["host-cli"]);
        assert_eq!(result.state, Some(TaskState::Failed));
    }
}
