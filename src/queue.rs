//! In-memory dispatch queue between the watcher and the executor.
//!
//! Unbounded FIFO with exactly one producer handle and one consumer handle.
//! Neither handle is `Clone`, so a second executor cannot drain the queue.
//! `push` never blocks; `pop` waits at most `timeout` so the executor can
//! re-check its running flag between waits.

use crate::error::{RelayError, Result};
use crate::task::{Task, TaskState};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// Create a connected producer/consumer pair.
pub fn dispatch_queue() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = channel::unbounded();
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// Producer side, owned by the watcher.
#[derive(Debug)]
pub struct QueueProducer {
    tx: Sender<Task>,
}

impl QueueProducer {
    /// Mark the task `Queued` and append it.
    ///
    /// Fails only if the consumer is gone (the engine is shutting down).
    pub fn push(&self, mut task: Task) -> Result<()> {
        task.transition(TaskState::Queued)?;
        let id = task.id.clone();
        self.tx.send(task).map_err(|_| {
            RelayError::UserError(format!(
                "dispatch queue closed; task {} was not queued",
                id
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Consumer side, owned by the single executor.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: Receiver<Task>,
}

impl QueueConsumer {
    /// Wait up to `timeout` for the next task.
    ///
    /// Returns `None` on timeout. Once the producer is dropped and the queue
    /// is drained it still waits out `timeout` before returning `None`, so a
    /// polling loop keeps its pace instead of spinning.
    pub fn pop(&self, timeout: Duration) -> Option<Task> {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => Some(task),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                None
            }
        }
    }

    /// Take the next task without waiting.
    pub fn try_pop(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
