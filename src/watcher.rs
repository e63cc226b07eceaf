//! Task store watcher: the producer side of the pipeline.
//!
//! The watcher polls the store on a fixed interval and keeps, per path, the
//! last modification time it acted on (the high-water mark). A file is new if
//! it has no mark and changed if its mtime is past the mark. For each new or
//! changed file it:
//!
//! 1. waits a short settle delay, and skips the file for this round if its
//!    mtime moved meanwhile (still being written),
//! 2. reads it and drops it silently if the provenance marker is missing,
//! 3. screens the payload and logs a rejection instead of queueing,
//! 4. pushes a `Task` onto the dispatch queue.
//!
//! A missing store reads as empty, and one unreadable file never stops the
//! rest of the scan. The watcher only ever reads task files.

use crate::events::{AuditLog, Event, EventAction};
use crate::queue::QueueProducer;
use crate::safety::DenyList;
use crate::task::{StoreEntry, TaskId, TaskStore};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

/// What one scan did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Tasks pushed onto the queue, in queue order.
    pub queued: Vec<TaskId>,
    pub rejected: usize,
    /// Files without the provenance marker.
    pub foreign: usize,
    pub unreadable: usize,
    /// Files still changing after the settle delay; retried next scan.
    pub unsettled: usize,
}

impl ScanReport {
    pub fn is_idle(&self) -> bool {
        *self == ScanReport::default()
    }
}

pub struct Watcher {
    store: TaskStore,
    deny: DenyList,
    producer: QueueProducer,
    seen: HashMap<PathBuf, SystemTime>,
    poll_interval: Duration,
    settle_delay: Duration,
    audit: Option<AuditLog>,
}

impl Watcher {
    pub fn new(
        store: TaskStore,
        deny: DenyList,
        producer: QueueProducer,
        poll_interval: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            store,
            deny,
            producer,
            seen: HashMap::new(),
            poll_interval,
            settle_delay,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Mark every file currently in the store as seen without dispatching.
    pub fn baseline(&mut self) -> usize {
        let entries = self.store.list_task_files();
        let count = entries.len();
        for entry in entries {
            self.seen.insert(entry.path, entry.modified);
        }
        tracing::info!(files = count, "recorded existing task files as baseline");
        count
    }

    /// Scan until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        tracing::info!(
            store = %self.store.root().display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "watcher started"
        );

        while running.load(Ordering::SeqCst) {
            self.scan_once();
            thread::sleep(self.poll_interval);
        }

        tracing::info!("watcher stopped");
    }

    /// One pass over the store.
    pub fn scan_once(&mut self) -> ScanReport {
        let mut report = ScanReport::default();
        let entries = self.store.list_task_files();

        // Forget vanished files so a recreated file counts as new.
        self.seen
            .retain(|path, _| entries.iter().any(|e| &e.path == path));

        let mut changed: Vec<StoreEntry> = entries
            .into_iter()
            .filter(|entry| match self.seen.get(&entry.path) {
                None => true,
                Some(mark) => entry.modified > *mark,
            })
            .collect();

        if changed.is_empty() {
            return report;
        }

        // Discovery order is modification order; name breaks ties.
        changed.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        tracing::debug!(files = changed.len(), "new or changed task files");

        thread::sleep(self.settle_delay);

        for entry in changed {
            self.process(entry, &mut report);
        }

        report
    }

    fn process(&mut self, entry: StoreEntry, report: &mut ScanReport) {
        let current = match std::fs::metadata(&entry.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), error = %e, "task file vanished during settle");
                report.unreadable += 1;
                return;
            }
        };
        if current != entry.modified {
            tracing::debug!(path = %entry.path.display(), "task file still being written; retrying next scan");
            report.unsettled += 1;
            return;
        }

        // Mark before reading: a bad file is retried only after it changes.
        self.seen.insert(entry.path.clone(), entry.modified);

        let task = match self.store.load(&entry.path) {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::debug!(path = %entry.path.display(), "no provenance marker; ignoring");
                report.foreign += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable task file");
                report.unreadable += 1;
                return;
            }
        };

        self.record(
            Event::new(EventAction::Discovered)
                .with_task(task.id.to_string())
                .with_details(json!({ "path": entry.path })),
        );

        let screening = self.deny.screen(&task.payload);
        if let Some(reason) = screening.reason() {
            tracing::warn!(task_id = %task.id, reason = %reason, "task rejected by safety filter");
            self.record(
                Event::new(EventAction::SafetyRejected)
                    .with_task(task.id.to_string())
                    .with_details(json!({ "stage": "discover", "reason": reason })),
            );
            report.rejected += 1;
            return;
        }

        let id = task.id.clone();
        match self.producer.push(task) {
            Ok(()) => {
                tracing::info!(task_id = %id, "task queued");
                self.record(Event::new(EventAction::Queued).with_task(id.to_string()));
                report.queued.push(id);
            }
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "failed to queue task");
            }
        }
    }

    fn record(&self, event: Event) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}
