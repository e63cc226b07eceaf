//! Tasks and the task store.
//!
//! A task is one file in the task store carrying a provenance marker and an
//! opaque script payload. The file name encodes a timestamp and a
//! per-process counter, which makes it the task's identifier.
//!
//! # Task File Format
//!
//! ```text
//! // HostRelay task
//! // Generated at: 2026-10-18 14:03:11
//!
//! var comp = app.project.activeItem;
//!
//! // Log completion
//! $.writeln("HostRelay task completed");
//! ```

mod model;
mod store;


pub use model::{Task, TaskId, TaskState};
pub use store::{StoreEntry, TaskStore};
