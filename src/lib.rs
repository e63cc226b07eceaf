//! Hostrelay: file-based task dispatch for a desktop host application.
//!
//! Producers drop marked script files into a task store. A watcher thread
//! screens them and queues them; a single executor thread probes the host,
//! walks an ordered chain of execution strategies, and leaves a manual
//! launcher behind when every strategy fails.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod exit_codes;
pub mod fs;
pub mod lock;
pub mod logging;
pub mod probe;
pub mod process;
pub mod queue;
pub mod safety;
pub mod strategy;
pub mod task;
pub mod template;
pub mod watcher;

#[cfg(test)]
mod test_support;
