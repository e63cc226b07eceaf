//! Implementation of `hostrelay --check`.
//!
//! Probes the host once (no waiting) and prints
//! `{success, message, status, version?, path?}`.

use super::print_json;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::exit_codes;
use crate::probe::{HostStatus, ProbeReport, ReadinessProbe, SystemProbe};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct CheckResult {
    success: bool,
    message: String,
    status: HostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

impl CheckResult {
    fn from_report(report: ProbeReport, app_name: &str) -> (Self, i32) {
        let (message, exit_code) = match report.status {
            HostStatus::Ready => {
                let message = match &report.version {
                    Some(v) => format!("{} {} is ready", app_name, v),
                    None => format!("{} is ready", app_name),
                };
                (message, exit_codes::SUCCESS)
            }
            HostStatus::NotRunning => {
                let err = RelayError::HostUnavailable(report.diagnostic);
                (err.to_string(), err.exit_code())
            }
            HostStatus::RunningUnresponsive => {
                let err = RelayError::HostUnresponsive(report.diagnostic);
                (err.to_string(), err.exit_code())
            }
        };

        let result = Self {
            success: report.status == HostStatus::Ready,
            message,
            status: report.status,
            version: report.version,
            path: report.install_path,
        };
        (result, exit_code)
    }
}

/// Execute `hostrelay --check`.
pub fn cmd_check(config: &Config) -> Result<i32> {
    let probe = SystemProbe::new(config.host.clone());
    let report = probe.probe();
    tracing::debug!(status = %report.status, "host probed");

    let (result, exit_code) = CheckResult::from_report(report, &config.host.app_name);
    print_json(&result)?;
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_report_includes_version_and_path() {
        let mut report = ProbeReport::new(HostStatus::Ready, "");
        report.version = Some("25.1".to_string());
        report.install_path = Some(PathBuf::from("/Applications/Host"));

        let (result, code) = CheckResult::from_report(report, "Host App");

        assert!(result.success);
        assert_eq!(result.message, "Host App 25.1 is ready");
        assert_eq!(code, exit_codes::SUCCESS);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["version"], "25.1");
        assert_eq!(json["path"], "/Applications/Host");
    }

    #[test]
    fn test_not_running_is_unsuccessful() {
        let report = ProbeReport::new(HostStatus::NotRunning, "Host App is not running");
        let (result, code) = CheckResult::from_report(report, "Host App");

        assert!(!result.success);
        assert_eq!(
            result.message,
            "host application unavailable: Host App is not running"
        );
        assert_eq!(code, exit_codes::HOST_UNAVAILABLE);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("version").is_none());
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_unresponsive_exit_code() {
        let report = ProbeReport::new(HostStatus::RunningUnresponsive, "no answer");
        let (result, code) = CheckResult::from_report(report, "Host App");
        assert!(result.message.contains("not responding: no answer"));
        assert_eq!(code, exit_codes::HOST_UNRESPONSIVE);
    }
}
