//! Implementation of `hostrelay submit`.

use super::print_json;
use crate::config::Config;
use crate::error::Result;
use crate::exit_codes;
use crate::safety::DenyList;
use crate::task::{TaskId, TaskStore};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResult {
    success: bool,
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<TaskId>,
}

/// Write a screened task file into the store for the watcher to pick up.
///
/// A rejected payload surfaces as `RelayError::SafetyRejected` (exit 2)
/// and nothing is written.
pub fn cmd_submit(config: &Config, payload: &str) -> Result<i32> {
    let store = TaskStore::from_config(config)?;
    let deny = DenyList::from_config(config)?;

    let path = store.submit(&deny, payload)?;
    print_json(&SubmitResult {
        success: true,
        task_id: TaskId::from_path(&path),
        path,
    })?;
    Ok(exit_codes::SUCCESS)
}
