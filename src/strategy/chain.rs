//! Strategy chain construction from config.

use super::{ExecutionStrategy, HostCli, Launcher, ScriptRunner, UiAutomation};
use crate::config::{Config, StrategyConfig, StrategyKind};

/// Build the ordered strategy chain. List order in config is priority order.
pub fn build_chain(config: &Config) -> Vec<Box<dyn ExecutionStrategy>> {
    config
        .strategies
        .iter()
        .map(|entry| build_one(entry, &config.host.app_name))
        .collect()
}

fn build_one(entry: &StrategyConfig, app_name: &str) -> Box<dyn ExecutionStrategy> {
    match entry.kind {
        StrategyKind::ScriptRunner => Box::new(ScriptRunner::from_config(entry, app_name)),
        StrategyKind::UiAutomation => Box::new(UiAutomation::from_config(entry, app_name)),
        StrategyKind::HostCli => Box::new(HostCli::from_config(entry)),
        StrategyKind::Launcher => Box::new(Launcher::from_config(entry, app_name)),
    }
}
