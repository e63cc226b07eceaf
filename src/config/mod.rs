//! Configuration model for hostrelay.
//!
//! The Config struct represents `config.yaml`. It supports forward-compatible
//! YAML parsing (unknown fields are ignored), defaults for every field, and
//! validation of values before anything is started.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub(crate) use operations::expand_home;
pub use types::{
    ExecutorSettings, FallbackSettings, HostSettings, SafetySettings, StrategyConfig,
    StrategyKind, WatcherSettings,
};
