//! The executor: drains the dispatch queue and walks each task through the
//! strategy chain.
//!
//! # Per-task flow
//!
//! ```text
//! Dequeued -> Screening -> ProbeReadiness -> Attempting(1..n) -> Succeeded
//!                 |                                 |
//!                 v                                 v
//!               Failed                        AllExhausted -> ManualFallback
//! ```
//!
//! - The task file is re-read and re-screened right before execution, so a
//!   file edited after discovery is judged on what will actually run.
//! - The chain runs in config order; the first success wins and no later
//!   strategy is tried. A timeout counts as a failure.
//! - When the host is not ready, strategies that need a running host are
//!   skipped (recorded as `skipped`) and only host-activating ones run.
//! - One task reaches a terminal state before the next is dequeued.

mod fallback;
mod result;


pub use fallback::ManualFallback;
pub use result::{AttemptRecord, DispatchResult};

use crate::config::{Config, HostSettings};
use crate::error::RelayError;
use crate::events::{AuditLog, Event, EventAction};
use crate::exit_codes;
use crate::lock;
use crate::probe::{HostStatus, ProbeReport, ReadinessProbe, SystemProbe, wait_for_ready};
use crate::process::run_argv;
use crate::queue::QueueConsumer;
use crate::safety::{DenyList, Screening};
use crate::strategy::{ExecutionStrategy, build_chain};
use crate::task::{Task, TaskState, TaskStore};
use crate::template::{render_command, vars};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Single-consumer executor. Owns the strategy chain and the readiness
/// probe; nothing else ever invokes them.
pub struct Executor {
    store: TaskStore,
    deny: DenyList,
    chain: Vec<Box<dyn ExecutionStrategy>>,
    probe: Box<dyn ReadinessProbe>,
    fallback: ManualFallback,
    host: HostSettings,
    audit: Option<AuditLog>,
}

impl Executor {
    pub fn new(
        store: TaskStore,
        deny: DenyList,
        chain: Vec<Box<dyn ExecutionStrategy>>,
        probe: Box<dyn ReadinessProbe>,
        fallback: ManualFallback,
        host: HostSettings,
    ) -> Self {
        Self {
            store,
            deny,
            chain,
            probe,
            fallback,
            host,
            audit: None,
        }
    }

    /// Executor with the configured chain and the real system probe.
    pub fn from_config(config: &Config, store: TaskStore, deny: DenyList) -> Self {
        Self::new(
            store,
            deny,
            build_chain(config),
            Box::new(SystemProbe::new(config.host.clone())),
            ManualFallback::new(config.fallback.clone(), config.host.app_name.clone()),
            config.host.clone(),
        )
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Drain `consumer` until `running` is cleared.
    ///
    /// Each pop waits at most `pop_timeout`, so a cleared flag is noticed
    /// within that bound once the in-flight task (if any) finishes.
    /// Returns the number of tasks processed.
    pub fn run(&self, consumer: &QueueConsumer, running: &AtomicBool, pop_timeout: Duration) -> usize {
        let mut processed = 0;
        tracing::info!(strategies = self.chain.len(), "executor started");

        while running.load(Ordering::SeqCst) {
            if let Some(task) = consumer.pop(pop_timeout) {
                self.dispatch(task);
                processed += 1;
            }
        }

        let abandoned = self.abandon_queued(consumer).len();
        tracing::info!(processed, abandoned, "executor stopped");
        processed
    }

    /// Fail every task still queued, so none is left without a terminal
    /// state when the engine stops. The task files stay where they are.
    pub fn abandon_queued(&self, consumer: &QueueConsumer) -> Vec<DispatchResult> {
        let mut results = Vec::new();
        while let Some(mut task) = consumer.try_pop() {
            tracing::warn!(task_id = %task.id, "engine stopped before the task was dispatched");
            let message = format!(
                "engine stopped before the task was dispatched; '{}' was not executed",
                task.path.display()
            );
            results.push(self.fail(&mut task, message, exit_codes::EXECUTION_FAILURE));
        }
        results
    }

    /// Process everything currently queued, then return.
    pub fn drain(&self, consumer: &QueueConsumer) -> Vec<DispatchResult> {
        let mut results = Vec::new();
        while let Some(task) = consumer.try_pop() {
            results.push(self.dispatch(task));
        }
        results
    }

    /// Synchronous path: screen `payload`, write it to the store's `direct/`
    /// directory (never watched), and dispatch it immediately.
    ///
    /// Holds the store lock for the whole call, so it is refused while an
    /// engine is running on the same store.
    pub fn execute_now(&self, payload: &str) -> DispatchResult {
        let screening = self.deny.screen(payload);
        if !screening.is_allowed() {
            let reason = screening.reason().unwrap_or_default();
            tracing::warn!(reason = %reason, "payload rejected before dispatch");
            self.record(Event::new(EventAction::SafetyRejected).with_details(json!({
                "stage": "execute",
                "reason": reason,
            })));
            return DispatchResult::failed(None, reason, exit_codes::SAFETY_REJECTED);
        }

        let _lock = match lock::acquire(&self.store, "execute") {
            Ok(lock) => lock,
            Err(e) => return DispatchResult::failed(None, e.to_string(), e.exit_code()),
        };

        let path = match self.store.write_direct(payload) {
            Ok(path) => path,
            Err(e) => return DispatchResult::failed(None, e.to_string(), e.exit_code()),
        };

        match self.store.load(&path) {
            Ok(Some(task)) => self.dispatch(task),
            Ok(None) => DispatchResult::failed(
                None,
                format!("task file '{}' lost its marker after writing", path.display()),
                exit_codes::USER_ERROR,
            ),
            Err(e) => DispatchResult::failed(None, e.to_string(), e.exit_code()),
        }
    }

    /// Take one task to a terminal state.
    pub fn dispatch(&self, mut task: Task) -> DispatchResult {
        let started = Instant::now();
        let span = tracing::info_span!("dispatch", task_id = %task.id);
        let _enter = span.enter();

        if let Err(e) = task.transition(TaskState::Validating) {
            tracing::error!(error = %e, "task cannot be dispatched from its current state");
            return DispatchResult::failed(Some(task.id.clone()), e.to_string(), e.exit_code());
        }

        if let Err(result) = self.rescreen(&mut task) {
            return result;
        }

        let report = self.probe_host();
        self.finish_transition(&mut task, TaskState::Executing);

        let host_ready = report.is_ready();
        let mut attempts = Vec::with_capacity(self.chain.len());

        for strategy in &self.chain {
            if strategy.requires_running_host() && !host_ready {
                tracing::debug!(strategy = strategy.name(), host = %report.status, "skipping strategy; host not ready");
                let record = AttemptRecord::skipped(
                    strategy.name(),
                    format!("requires a running host (host is {})", report.status),
                );
                self.record_attempt(&task, &record);
                attempts.push(record);
                continue;
            }

            tracing::info!(strategy = strategy.name(), "attempting strategy");
            let attempt_start = Instant::now();
            let outcome = strategy.attempt(&task);
            let record = AttemptRecord::from_outcome(strategy.name(), &outcome, attempt_start.elapsed());
            self.record_attempt(&task, &record);
            attempts.push(record);

            if outcome.is_success() {
                self.finish_transition(&mut task, TaskState::Succeeded);
                tracing::info!(
                    strategy = strategy.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "task succeeded"
                );
                self.record(
                    Event::new(EventAction::Succeeded)
                        .with_task(task.id.to_string())
                        .with_details(json!({ "strategy": strategy.name() })),
                );
                return DispatchResult::succeeded(task.id.clone(), strategy.name(), report.status, attempts);
            }

            // Strategy errors stay internal; they only advance the chain.
            let error = RelayError::StrategyFailed {
                strategy: strategy.name().to_string(),
                diagnostic: outcome.diagnostic().to_string(),
            };
            tracing::warn!(status = %outcome.status(), "{}", error);
        }

        self.fall_back(task, &report, attempts)
    }

    /// Re-read the task file and screen what is on disk now.
    fn rescreen(&self, task: &mut Task) -> std::result::Result<(), DispatchResult> {
        let fresh = match self.store.load(&task.path) {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                let message = format!(
                    "task file '{}' no longer carries the '{}' marker; it was not executed",
                    task.path.display(),
                    self.store.marker()
                );
                return Err(self.fail(task, message, exit_codes::USER_ERROR));
            }
            Err(e) => {
                let message = format!("{}; the task was not executed", e);
                return Err(self.fail(task, message, exit_codes::USER_ERROR));
            }
        };
        task.payload = fresh.payload;

        match self.deny.screen(&task.payload) {
            Screening::Allowed => Ok(()),
            rejected => {
                let reason = rejected.reason().unwrap_or_default();
                tracing::warn!(reason = %reason, "payload rejected at execution time");
                self.record(
                    Event::new(EventAction::SafetyRejected)
                        .with_task(task.id.to_string())
                        .with_details(json!({ "stage": "execute", "reason": reason })),
                );
                Err(self.fail(task, reason, exit_codes::SAFETY_REJECTED))
            }
        }
    }

    /// Probe once, and wait (bounded) only if the host is running but not
    /// answering.
    fn probe_host(&self) -> ProbeReport {
        let first = self.probe.probe();
        if first.status == HostStatus::RunningUnresponsive {
            tracing::info!(
                ceiling_secs = self.host.wait_ceiling_secs,
                "host unresponsive; waiting for it to recover"
            );
        }
        let report = wait_for_ready(
            self.probe.as_ref(),
            first,
            Duration::from_secs(self.host.wait_ceiling_secs),
            Duration::from_secs(self.host.wait_poll_secs),
        );

        tracing::debug!(status = %report.status, "host readiness");
        report
    }

    fn fall_back(&self, mut task: Task, report: &ProbeReport, attempts: Vec<AttemptRecord>) -> DispatchResult {
        match self.fallback.write(&task) {
            Ok(artifact) => {
                self.finish_transition(&mut task, TaskState::ManualFallback);
                tracing::warn!(artifact = %artifact.display(), "all strategies failed; manual launcher written");
                self.record(
                    Event::new(EventAction::ManualFallback)
                        .with_task(task.id.to_string())
                        .with_details(json!({ "artifact": artifact })),
                );
                self.activate_host();

                let mut message = format!(
                    "{} (or choose File > Scripts > Run Script File... in {} and pick '{}')",
                    RelayError::AllStrategiesExhausted {
                        artifact: artifact.clone()
                    },
                    self.host.app_name,
                    task.path.display()
                );
                if !report.is_ready() {
                    message.push_str(&format!("; host check: {}", report.diagnostic));
                }
                DispatchResult::manual_fallback(task.id.clone(), artifact, message, report.status, attempts)
            }
            Err(e) => {
                let message = format!(
                    "all execution strategies failed and the manual launcher could not be written: {}; \
                     run '{}' by hand from {}",
                    e,
                    task.path.display(),
                    self.host.app_name
                );
                self.fail(&mut task, message, exit_codes::EXECUTION_FAILURE)
                    .with_attempts(report.status, attempts)
            }
        }
    }

    /// Best-effort: bring the host forward so the launcher is easy to run.
    fn activate_host(&self) {
        let template = self.host.activate_command.trim();
        if template.is_empty() {
            return;
        }

        let argv = match render_command(template, &vars([("app_name", self.host.app_name.as_str())])) {
            Ok(argv) => argv,
            Err(e) => {
                tracing::debug!(error = %e, "activate command not usable");
                return;
            }
        };

        match run_argv(&argv, Duration::from_secs(self.host.probe_timeout_secs)) {
            Ok(outcome) if outcome.is_success() => tracing::debug!("host activated"),
            Ok(outcome) => tracing::debug!(result = %outcome.summary(), "host activation failed"),
            Err(e) => tracing::debug!(error = %e, "host activation failed"),
        }
    }

    fn fail(&self, task: &mut Task, message: String, exit_code: i32) -> DispatchResult {
        self.finish_transition(task, TaskState::Failed);
        self.record(
            Event::new(EventAction::Failed)
                .with_task(task.id.to_string())
                .with_details(json!({ "reason": message })),
        );
        DispatchResult::failed(Some(task.id.clone()), message, exit_code)
    }

    /// Transitions here follow the fixed flow above and cannot be refused;
    /// a refusal would be a bug, so it is logged rather than propagated.
    fn finish_transition(&self, task: &mut Task, next: TaskState) {
        if let Err(e) = task.transition(next) {
            tracing::error!(error = %e, "unexpected task state");
        }
    }

    fn record_attempt(&self, task: &Task, record: &AttemptRecord) {
        self.record(
            Event::new(EventAction::StrategyAttempt)
                .with_task(task.id.to_string())
                .with_details(json!({
                    "strategy": record.strategy,
                    "status": record.status,
                    "diagnostic": record.diagnostic,
                    "elapsed_ms": record.elapsed_ms,
                })),
        );
    }

    fn record(&self, event: Event) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}
