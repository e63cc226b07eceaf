//! Readiness probe against the real host: install paths, the OS process
//! table, and a version query through the automation bridge.

use super::{HostStatus, ProbeReport, ReadinessProbe};
use crate::config::{HostSettings, expand_home};
use crate::process::run_argv;
use crate::template::{render_command, vars};
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::System;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
}

/// Source of process listings.
pub trait ProcessTable: Send + Sync {
    fn snapshot(&self) -> Vec<ProcessEntry>;
}

/// The live OS process table, read through `sysinfo`.
#[derive(Debug, Default)]
pub struct SysinfoTable;

impl ProcessTable for SysinfoTable {
    fn snapshot(&self) -> Vec<ProcessEntry> {
        let mut sys = System::new();
        sys.refresh_processes();

        let own_pid = sysinfo::get_current_pid().ok();
        sys.processes()
            .iter()
            .filter(|(pid, _)| Some(**pid) != own_pid)
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                cmdline: process.cmd().join(" "),
            })
            .collect()
    }
}

/// Probe backed by the host settings from config.
pub struct SystemProbe {
    settings: HostSettings,
    table: Box<dyn ProcessTable>,
}

impl SystemProbe {
    pub fn new(settings: HostSettings) -> Self {
        Self::with_table(settings, Box::new(SysinfoTable))
    }

    pub fn with_table(settings: HostSettings, table: Box<dyn ProcessTable>) -> Self {
        Self { settings, table }
    }

    /// First configured install path that exists.
    ///
    /// `Ok(None)` means no paths are configured, so presence is decided by
    /// the process table alone. `Err(())` means paths are configured and
    /// none of them exist.
    fn find_install(&self) -> Result<Option<PathBuf>, ()> {
        if self.settings.install_paths.is_empty() {
            return Ok(None);
        }
        self.settings
            .install_paths
            .iter()
            .map(|p| expand_home(p))
            .find(|p| p.exists())
            .map(Some)
            .ok_or(())
    }

    fn find_process(&self) -> Option<ProcessEntry> {
        let pattern = self.settings.process_pattern.to_lowercase();
        self.table.snapshot().into_iter().find(|entry| {
            entry.name.to_lowercase().contains(&pattern)
                || entry.cmdline.to_lowercase().contains(&pattern)
        })
    }

    fn query_version(&self) -> Result<String, String> {
        let argv = render_command(
            &self.settings.version_query,
            &vars([("app_name", self.settings.app_name.as_str())]),
        )
        .map_err(|e| e.to_string())?;

        let timeout = Duration::from_secs(self.settings.probe_timeout_secs);
        let outcome = run_argv(&argv, timeout).map_err(|e| e.to_string())?;

        if outcome.is_success() {
            Ok(outcome.stdout.trim().to_string())
        } else {
            Err(outcome.summary())
        }
    }
}

impl ReadinessProbe for SystemProbe {
    fn probe(&self) -> ProbeReport {
        let app = &self.settings.app_name;

        let install_path = match self.find_install() {
            Ok(path) => path,
            Err(()) => {
                tracing::debug!(app = %app, "no host installation found");
                return ProbeReport::new(
                    HostStatus::NotRunning,
                    format!(
                        "{} is not installed at any configured location; \
                         install it or add its path to host.install_paths",
                        app
                    ),
                );
            }
        };

        let Some(process) = self.find_process() else {
            tracing::debug!(app = %app, "host process not found");
            let mut report = ProbeReport::new(
                HostStatus::NotRunning,
                format!("{} is not running; start it and try again", app),
            );
            report.install_path = install_path;
            return report;
        };

        match self.query_version() {
            Ok(version) => {
                tracing::debug!(app = %app, pid = process.pid, version = %version, "host ready");
                let mut report = ProbeReport::new(HostStatus::Ready, format!("{} is ready", app));
                report.version = Some(version).filter(|v| !v.is_empty());
                report.install_path = install_path;
                report
            }
            Err(diagnostic) => {
                tracing::debug!(app = %app, pid = process.pid, diagnostic = %diagnostic, "host not answering");
                let mut report = ProbeReport::new(
                    HostStatus::RunningUnresponsive,
                    format!(
                        "{} is running (pid {}) but did not answer the version query ({}); \
                         close any open dialogs in it and try again",
                        app, process.pid, diagnostic
                    ),
                );
                report.install_path = install_path;
                report
            }
        }
    }
}
