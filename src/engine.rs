//! Engine lifecycle: wiring, `start`, and `stop`.
//!
//! The engine is one watcher thread and one executor thread joined by the
//! dispatch queue. A shared running flag is the only cancellation signal:
//! both loops check it at the top of each iteration, and the executor's
//! bounded queue pop means it notices within `pop_timeout`. Strategy calls
//! already in flight are allowed to finish or time out; tasks still queued
//! at that point are failed rather than left behind.
//!
//! The store lock is held for as long as anything dispatches: by the
//! executor thread for a running engine, and for the whole call in
//! `run_once`.

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::events::{AuditLog, Event, EventAction};
use crate::executor::{DispatchResult, Executor};
use crate::lock;
use crate::queue::{QueueConsumer, dispatch_queue};
use crate::safety::DenyList;
use crate::task::TaskStore;
use crate::watcher::{ScanReport, Watcher};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// The three connected parts of the pipeline, not yet running.
pub struct Pipeline {
    pub watcher: Watcher,
    pub executor: Executor,
    pub consumer: QueueConsumer,
}

impl Pipeline {
    /// Build the pipeline from config, with the audit log enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = TaskStore::from_config(config)?;
        store.ensure_exists()?;
        let deny = DenyList::from_config(config)?;
        let audit = AuditLog::for_store(&store);

        let (producer, consumer) = dispatch_queue();
        let watcher = Watcher::new(
            store.clone(),
            deny.clone(),
            producer,
            config.poll_interval(),
            config.settle_delay(),
        )
        .with_audit(audit.clone());
        let executor = Executor::from_config(config, store, deny).with_audit(audit);

        Ok(Self {
            watcher,
            executor,
            consumer,
        })
    }

    /// One scan, then dispatch everything it queued.
    ///
    /// Fails without scanning if another process holds the store lock.
    pub fn run_once(mut self) -> Result<(ScanReport, Vec<DispatchResult>)> {
        let _lock = lock::acquire(self.executor.store(), "run --once")?;
        let report = self.watcher.scan_once();
        let results = self.executor.drain(&self.consumer);
        Ok((report, results))
    }
}

/// Timing for a running engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub pop_timeout: Duration,
    pub shutdown_timeout: Duration,
    /// Ignore files already in the store at startup.
    pub baseline_existing: bool,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pop_timeout: config.pop_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
            baseline_existing: config.watcher.baseline_existing,
        }
    }
}

/// How the workers ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub watcher_joined: bool,
    pub executor_joined: bool,
    /// Tasks the executor processed, if it was joined.
    pub processed: Option<usize>,
}

/// A running engine. Dropping it clears the running flag without waiting.
pub struct Engine {
    running: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
    executor: Option<JoinHandle<usize>>,
    shutdown_timeout: Duration,
    audit: Option<AuditLog>,
}

impl Engine {
    /// Take the store lock and spawn the watcher and executor threads.
    ///
    /// The lock moves into the executor thread and is released when that
    /// thread ends.
    pub fn start(pipeline: Pipeline, settings: EngineSettings) -> Result<Self> {
        let Pipeline {
            mut watcher,
            executor,
            consumer,
        } = pipeline;
        let store_lock = lock::acquire(executor.store(), "run")?;

        if settings.baseline_existing {
            watcher.baseline();
        }

        let audit = AuditLog::for_store(executor.store());
        let running = Arc::new(AtomicBool::new(true));

        let executor_flag = Arc::clone(&running);
        let pop_timeout = settings.pop_timeout;
        let executor_handle = thread::Builder::new()
            .name("hostrelay-executor".to_string())
            .spawn(move || {
                let _store_lock = store_lock;
                executor.run(&consumer, &executor_flag, pop_timeout)
            })
            .map_err(|e| RelayError::UserError(format!("failed to start executor thread: {}", e)))?;

        let watcher_flag = Arc::clone(&running);
        let watcher_handle = match thread::Builder::new()
            .name("hostrelay-watcher".to_string())
            .spawn(move || watcher.run(&watcher_flag))
        {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(RelayError::UserError(format!(
                    "failed to start watcher thread: {}",
                    e
                )));
            }
        };

        audit.record(Event::new(EventAction::Start));
        tracing::info!("engine started");

        Ok(Self {
            running,
            watcher: Some(watcher_handle),
            executor: Some(executor_handle),
            shutdown_timeout: settings.shutdown_timeout,
            audit: Some(audit),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle for signal handlers or other threads to request shutdown.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Clear the running flag and join both workers, waiting at most
    /// `shutdown_timeout` for each. A worker still busy past that bound
    /// (a strategy call running to its own timeout) is left to finish
    /// detached.
    pub fn stop(mut self) -> StopReport {
        self.running.store(false, Ordering::SeqCst);

        let watcher_joined = self
            .watcher
            .take()
            .map(|h| join_bounded(h, self.shutdown_timeout, "watcher").is_some())
            .unwrap_or(true);
        let processed = self
            .executor
            .take()
            .and_then(|h| join_bounded(h, self.shutdown_timeout, "executor"));

        let report = StopReport {
            watcher_joined,
            executor_joined: processed.is_some(),
            processed,
        };

        if let Some(audit) = self.audit.take() {
            audit.record(Event::new(EventAction::Stop).with_details(json!({
                "processed": report.processed,
                "clean": report.watcher_joined && report.executor_joined,
            })));
        }
        tracing::info!(processed = ?report.processed, "engine stopped");
        report
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn join_bounded<T>(handle: JoinHandle<T>, timeout: Duration, worker: &str) -> Option<T> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(worker, timeout_ms = timeout.as_millis() as u64, "worker did not stop in time; detaching");
            return None;
        }
        thread::sleep(JOIN_POLL);
    }

    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!(worker, "worker thread panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackSettings;
    use crate::executor::ManualFallback;
    use crate::probe::HostStatus;
    use crate::test_support::{
        Behavior, CallLog, RecordingStrategy, ScriptedProbe, quiet_host, test_store,
        write_task_file,
    };
    use tempfile::TempDir;

    fn pipeline(root: &std::path::Path, log: &CallLog, chain_fails: bool) -> Pipeline {
        let store = test_store(root);
        let deny = DenyList::from_config(&Config::default()).unwrap();
        let (producer, consumer) = dispatch_queue();
        let watcher = Watcher::new(
            store.clone(),
            deny.clone(),
            producer,
            Duration::from_millis(20),
            Duration::from_millis(20),
        );

        let chain = if chain_fails {
            vec![
                RecordingStrategy::boxed("first", Behavior::Fail, log),
                RecordingStrategy::boxed("second", Behavior::Fail, log),
            ]
        } else {
            vec![
                RecordingStrategy::boxed("first", Behavior::Succeed, log),
                RecordingStrategy::boxed("second", Behavior::Succeed, log),
            ]
        };
        let executor = Executor::new(
            store.clone(),
            deny,
            chain,
            Box::new(ScriptedProbe::new(vec![HostStatus::Ready])),
            ManualFallback::new(FallbackSettings::default(), "Host App"),
            quiet_host(),
        )
        .with_audit(AuditLog::for_store(&store));

        Pipeline {
            watcher,
            executor,
            consumer,
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            pop_timeout: Duration::from_millis(20),
            shutdown_timeout: Duration::from_secs(2),
            baseline_existing: false,
        }
    }

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn test_end_to_end_success_runs_first_strategy_once() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let engine = Engine::start(pipeline(temp_dir.path(), &log, false), settings()).unwrap();

        write_task_file(temp_dir.path(), "relay_1_0001.jsx", "var comp = app.project.activeItem;");

        assert!(wait_for(Duration::from_secs(5), || !log.entries().is_empty()));
        let report = engine.stop();

        assert!(report.watcher_joined && report.executor_joined);
        assert_eq!(report.processed, Some(1));
        assert_eq!(log.entries(), vec!["first:relay_1_0001"]);

        let events = AuditLog::for_store(&test_store(temp_dir.path())).read_all().unwrap();
        assert!(events.iter().any(|e| e.action == EventAction::Succeeded));
    }

    #[test]
    fn test_end_to_end_all_fail_leaves_manual_launcher() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let engine = Engine::start(pipeline(temp_dir.path(), &log, true), settings()).unwrap();

        write_task_file(temp_dir.path(), "relay_1_0001.jsx", "var marker_payload = 42;");
        let artifact = temp_dir.path().join("relay_1_0001_MANUAL_LAUNCHER.scpt");

        assert!(wait_for(Duration::from_secs(5), || artifact.exists()));
        engine.stop();

        assert_eq!(log.entries(), vec!["first:relay_1_0001", "second:relay_1_0001"]);
        let content = std::fs::read_to_string(&artifact).unwrap();
        assert!(content.contains("var marker_payload = 42;"));
    }

    #[test]
    fn test_stop_is_prompt_when_idle() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let engine = Engine::start(pipeline(temp_dir.path(), &log, false), settings()).unwrap();
        assert!(engine.is_running());

        let start = Instant::now();
        let report = engine.stop();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.processed, Some(0));
    }

    #[test]
    fn test_baseline_existing_ignores_old_files() {
        let temp_dir = TempDir::new().unwrap();
        write_task_file(temp_dir.path(), "relay_1_0001.jsx", "var old = 1;");
        let log = CallLog::default();
        let settings = EngineSettings {
            baseline_existing: true,
            ..settings()
        };
        let engine = Engine::start(pipeline(temp_dir.path(), &log, false), settings).unwrap();

        write_task_file(temp_dir.path(), "relay_1_0002.jsx", "var new_one = 1;");
        assert!(wait_for(Duration::from_secs(5), || !log.entries().is_empty()));
        engine.stop();

        assert_eq!(log.entries(), vec!["first:relay_1_0002"]);
    }

    #[test]
    fn test_run_once_scans_and_drains() {
        let temp_dir = TempDir::new().unwrap();
        write_task_file(temp_dir.path(), "relay_1_0001.jsx", "var a = 1;");
        write_task_file(temp_dir.path(), "relay_1_0002.jsx", "eval('no');");
        let log = CallLog::default();

        let (report, results) = pipeline(temp_dir.path(), &log, false).run_once().unwrap();

        assert_eq!(report.queued.len(), 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }

    #[test]
    fn test_run_once_refused_while_engine_runs() {
        let temp_dir = TempDir::new().unwrap();
        let running_log = CallLog::default();
        let engine = Engine::start(pipeline(temp_dir.path(), &running_log, false), settings()).unwrap();

        let second_log = CallLog::default();
        let err = pipeline(temp_dir.path(), &second_log, false).run_once().unwrap_err();

        assert!(matches!(err, RelayError::StoreLocked(_)));
        assert!(second_log.entries().is_empty());
        engine.stop();
    }

    #[test]
    fn test_second_engine_is_refused_until_first_stops() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let first = Engine::start(pipeline(temp_dir.path(), &log, false), settings()).unwrap();

        let second = Engine::start(pipeline(temp_dir.path(), &log, false), settings());
        assert!(matches!(second, Err(RelayError::StoreLocked(_))));

        let report = first.stop();
        assert!(report.executor_joined);
        assert!(!lock::lock_path(&test_store(temp_dir.path())).exists());

        Engine::start(pipeline(temp_dir.path(), &log, false), settings())
            .unwrap()
            .stop();
    }

    #[test]
    fn test_pipeline_from_config_creates_store() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("scripts");
        let config = Config {
            task_store: root.to_string_lossy().to_string(),
            ..Config::default()
        };

        Pipeline::from_config(&config).unwrap();

        assert!(root.is_dir());
    }
}
