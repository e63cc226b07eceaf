//! Error types for hostrelay.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hostrelay operations.
///
/// Each variant maps to a specific exit code. Strategy-level failures are
/// normally swallowed by the executor and only surface through
/// `AllStrategiesExhausted`.
#[derive(Error, Debug)]
pub enum RelayError {
    /// User provided invalid arguments, configuration, or the filesystem is in
    /// a state the user must fix.
    #[error("{0}")]
    UserError(String),

    /// The payload matched a deny-list pattern.
    #[error("payload rejected by safety filter (matched pattern '{pattern}')")]
    SafetyRejected { pattern: String },

    /// No host installation was found or the host process is not running.
    #[error("host application unavailable: {0}")]
    HostUnavailable(String),

    /// The host process exists but did not answer the readiness query in time.
    #[error("host application is running but not responding: {0}")]
    HostUnresponsive(String),

    /// One execution mechanism failed.
    #[error("strategy '{strategy}' failed: {diagnostic}")]
    StrategyFailed {
        strategy: String,
        diagnostic: String,
    },

    /// Every strategy failed; the task can still be completed by hand.
    #[error("all execution strategies failed; run the manual launcher at '{}'", artifact.display())]
    AllStrategiesExhausted { artifact: PathBuf },

    /// Another hostrelay process holds the task store lock.
    #[error("{0}")]
    StoreLocked(String),

    /// A task state change that the lifecycle does not allow.
    #[error("invalid task transition for {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },
}

impl RelayError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::UserError(_) => exit_codes::USER_ERROR,
            RelayError::SafetyRejected { .. } => exit_codes::SAFETY_REJECTED,
            RelayError::HostUnavailable(_) => exit_codes::HOST_UNAVAILABLE,
            RelayError::HostUnresponsive(_) => exit_codes::HOST_UNRESPONSIVE,
            RelayError::StrategyFailed { .. } => exit_codes::EXECUTION_FAILURE,
            RelayError::AllStrategiesExhausted { .. } => exit_codes::EXECUTION_FAILURE,
            RelayError::StoreLocked(_) => exit_codes::USER_ERROR,
            RelayError::InvalidTransition { .. } => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for hostrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = RelayError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn safety_rejection_has_correct_exit_code() {
        let err = RelayError::SafetyRejected {
            pattern: r"eval\s*\(".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::SAFETY_REJECTED);
    }

    #[test]
    fn host_errors_have_distinct_exit_codes() {
        let unavailable = RelayError::HostUnavailable("not installed".to_string());
        let unresponsive = RelayError::HostUnresponsive("version query timed out".to_string());
        assert_eq!(unavailable.exit_code(), exit_codes::HOST_UNAVAILABLE);
        assert_eq!(unresponsive.exit_code(), exit_codes::HOST_UNRESPONSIVE);
    }

    #[test]
    fn exhausted_error_names_the_artifact() {
        let err = RelayError::AllStrategiesExhausted {
            artifact: PathBuf::from("/tmp/task_MANUAL_LAUNCHER.scpt"),
        };
        assert_eq!(err.exit_code(), exit_codes::EXECUTION_FAILURE);
        assert!(err.to_string().contains("/tmp/task_MANUAL_LAUNCHER.scpt"));
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = RelayError::StrategyFailed {
            strategy: "host-cli".to_string(),
            diagnostic: "exit code 1".to_string(),
        };
        assert_eq!(err.to_string(), "strategy 'host-cli' failed: exit code 1");

        let err = RelayError::InvalidTransition {
            task_id: "relay_1_0001".to_string(),
            from: "succeeded".to_string(),
            to: "queued".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid task transition for relay_1_0001: succeeded -> queued"
        );
    }
}
