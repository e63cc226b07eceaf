//! Filesystem utilities for hostrelay.
//!
//! Atomic writes keep the watcher and the host application from ever reading
//! a half-written task file or launcher artifact.

pub mod atomic;

pub use atomic::{atomic_create_new, atomic_write, atomic_write_file};
