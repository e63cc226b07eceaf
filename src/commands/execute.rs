//! Implementation of `hostrelay --execute <PAYLOAD>`.

use super::print_json;
use crate::config::Config;
use crate::error::Result;
use crate::events::AuditLog;
use crate::executor::Executor;
use crate::safety::DenyList;
use crate::task::TaskStore;

/// Screen and run one payload now, bypassing the queue.
///
/// Prints the dispatch result as JSON and returns its exit code, which is
/// non-zero whenever `success` is false.
pub fn cmd_execute(config: &Config, payload: &str) -> Result<i32> {
    let store = TaskStore::from_config(config)?;
    let deny = DenyList::from_config(config)?;
    let audit = AuditLog::for_store(&store);

    let executor = Executor::from_config(config, store, deny).with_audit(audit);
    let result = executor.execute_now(payload);

    print_json(&result)?;
    Ok(result.exit_code())
}
