use crate::config::{Config, FallbackSettings, HostSettings};
use crate::executor::{Executor, ManualFallback};
use crate::probe::{HostStatus, ProbeReport, ReadinessProbe};
use crate::safety::DenyList;
use crate::strategy::{ExecutionStrategy, StrategyOutcome};
use crate::task::{Task, TaskStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const MARKER: &str = "HostRelay";

/// Shared, ordered record of strategy invocations.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: String) {
        self.0
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    Succeed,
    Fail,
    TimeOut,
}

/// Strategy with a fixed result that logs `name:task_id` on every attempt.
pub(crate) struct RecordingStrategy {
    name: String,
    behavior: Behavior,
    requires_running_host: bool,
    log: CallLog,
}

impl RecordingStrategy {
    pub(crate) fn boxed(name: &str, behavior: Behavior, log: &CallLog) -> Box<dyn ExecutionStrategy> {
        Box::new(Self {
            name: name.to_string(),
            behavior,
            requires_running_host: false,
            log: log.clone(),
        })
    }

    pub(crate) fn boxed_needing_host(name: &str, behavior: Behavior, log: &CallLog) -> Box<dyn ExecutionStrategy> {
        Box::new(Self {
            name: name.to_string(),
            behavior,
            requires_running_host: true,
            log: log.clone(),
        })
    }
}

impl ExecutionStrategy for RecordingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_running_host(&self) -> bool {
        self.requires_running_host
    }

    fn attempt(&self, task: &Task) -> StrategyOutcome {
        self.log.push(format!("{}:{}", self.name, task.id));
        match self.behavior {
            Behavior::Succeed => StrategyOutcome::Succeeded(format!("{} ran it", self.name)),
            Behavior::Fail => StrategyOutcome::Failed(format!("{} failed", self.name)),
            Behavior::TimeOut => StrategyOutcome::TimedOut(format!("{} timed out", self.name)),
        }
    }
}

/// Probe that replays a fixed sequence of statuses, repeating the last one.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedProbe {
    statuses: Vec<HostStatus>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub(crate) fn new(statuses: Vec<HostStatus>) -> Self {
        assert!(!statuses.is_empty(), "scripted probe needs at least one status");
        Self {
            statuses,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of probes so far, shared across clones.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReadinessProbe for ScriptedProbe {
    fn probe(&self) -> ProbeReport {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self.statuses[n.min(self.statuses.len() - 1)];
        ProbeReport::new(status, format!("scripted status {}", status))
    }
}

pub(crate) fn test_store(root: &Path) -> TaskStore {
    TaskStore::new(root, "*.jsx", MARKER, "jsx", "relay").unwrap()
}

/// Write a marked task file directly into `dir`.
pub(crate) fn write_task_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("// {} task\n{}\n", MARKER, body)).unwrap();
    path
}

/// Host settings that never wait and never run an activation command.
pub(crate) fn quiet_host() -> HostSettings {
    HostSettings {
        activate_command: String::new(),
        wait_ceiling_secs: 0,
        wait_poll_secs: 1,
        ..HostSettings::default()
    }
}

/// Executor over `store` with the given fakes and the default deny-list.
pub(crate) fn test_executor(
    store: TaskStore,
    chain: Vec<Box<dyn ExecutionStrategy>>,
    probe: ScriptedProbe,
) -> Executor {
    let deny = DenyList::from_config(&Config::default()).unwrap();
    Executor::new(
        store,
        deny,
        chain,
        Box::new(probe),
        ManualFallback::new(FallbackSettings::default(), "Host App"),
        quiet_host(),
    )
}
