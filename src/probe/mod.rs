//! Host readiness probing.
//!
//! A probe answers one question: can the host accept automation right now?
//! It checks that the host's process exists, then issues one side-effect-free
//! query (a version request) that a responsive host answers quickly. The
//! result is derived fresh on every call and never cached.

mod system;

pub use system::{ProcessEntry, ProcessTable, SysinfoTable, SystemProbe};

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

/// Host availability as seen by one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// No installation found, or no matching process.
    NotRunning,
    /// The process exists but the readiness query failed or timed out.
    RunningUnresponsive,
    /// The readiness query answered.
    Ready,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::NotRunning => "not_running",
            HostStatus::RunningUnresponsive => "running_unresponsive",
            HostStatus::Ready => "ready",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: HostStatus,
    /// Version string returned by the readiness query.
    pub version: Option<String>,
    /// First install path that exists, if any were configured.
    pub install_path: Option<PathBuf>,
    /// Why the host is not ready, with the precondition to fix.
    pub diagnostic: String,
}

impl ProbeReport {
    pub fn new(status: HostStatus, diagnostic: impl Into<String>) -> Self {
        Self {
            status,
            version: None,
            install_path: None,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == HostStatus::Ready
    }
}

/// Something that can check host readiness without changing host state.
pub trait ReadinessProbe: Send {
    fn probe(&self) -> ProbeReport;
}

/// Starting from the already-taken `first` report, re-poll `probe` until the
/// host is ready, is gone, or `ceiling` passes.
///
/// Only `RunningUnresponsive` is worth waiting on: a ready host needs no
/// wait, and a missing host will not appear by itself. `first` is returned
/// as-is in both of those cases, without probing again.
pub fn wait_for_ready(
    probe: &dyn ReadinessProbe,
    first: ProbeReport,
    ceiling: Duration,
    poll: Duration,
) -> ProbeReport {
    let start = Instant::now();
    let mut report = first;

    while report.status == HostStatus::RunningUnresponsive {
        let elapsed = start.elapsed();
        if elapsed >= ceiling {
            tracing::warn!(
                waited_ms = elapsed.as_millis() as u64,
                "host still unresponsive after wait ceiling"
            );
            break;
        }

        let remaining = ceiling - elapsed;
        tracing::debug!(diagnostic = %report.diagnostic, "host unresponsive; waiting to re-probe");
        thread::sleep(poll.min(remaining));
        report = probe.probe();
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProbe;

    #[test]
    fn test_ready_returns_without_waiting() {
        let probe = ScriptedProbe::new(vec![HostStatus::Ready]);
        let start = Instant::now();

        let first = probe.probe();
        let report = wait_for_ready(&probe, first, Duration::from_secs(30), Duration::from_secs(5));

        assert!(report.is_ready());
        assert_eq!(probe.calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_not_running_returns_without_waiting() {
        let probe = ScriptedProbe::new(vec![HostStatus::NotRunning]);
        let start = Instant::now();

        let first = probe.probe();
        let report = wait_for_ready(&probe, first, Duration::from_secs(30), Duration::from_secs(5));

        assert_eq!(report.status, HostStatus::NotRunning);
        assert_eq!(probe.calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_unresponsive_then_ready() {
        let probe = ScriptedProbe::new(vec![
            HostStatus::RunningUnresponsive,
            HostStatus::RunningUnresponsive,
            HostStatus::Ready,
        ]);

        let first = probe.probe();
        let report = wait_for_ready(&probe, first, Duration::from_secs(5), Duration::from_millis(10));

        assert!(report.is_ready());
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn test_unresponsive_stops_at_ceiling() {
        let probe = ScriptedProbe::new(vec![HostStatus::RunningUnresponsive]);
        let start = Instant::now();

        let first = probe.probe();
        let report = wait_for_ready(&probe, first, Duration::from_millis(100), Duration::from_millis(20));

        assert_eq!(report.status, HostStatus::RunningUnresponsive);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(probe.calls() >= 2);
    }

    #[test]
    fn test_zero_ceiling_returns_first_report() {
        let probe = ScriptedProbe::new(vec![HostStatus::RunningUnresponsive, HostStatus::Ready]);

        let first = probe.probe();
        let report = wait_for_ready(&probe, first, Duration::ZERO, Duration::from_millis(10));

        assert_eq!(report.status, HostStatus::RunningUnresponsive);
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(HostStatus::RunningUnresponsive.to_string(), "running_unresponsive");
        assert_eq!(
            serde_json::to_string(&HostStatus::NotRunning).unwrap(),
            "\"not_running\""
        );
    }
}
