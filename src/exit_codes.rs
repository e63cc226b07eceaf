//! Exit code constants for the hostrelay CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, unreadable store)
//! - 2: Payload rejected by the safety filter
//! - 3: Host application not installed or not running
//! - 4: Host application running but unresponsive
//! - 5: Execution failed (all strategies exhausted, manual fallback left behind)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or filesystem problems.
pub const USER_ERROR: i32 = 1;

/// The payload matched a deny-list pattern and was never attempted.
pub const SAFETY_REJECTED: i32 = 2;

/// No host installation found, or the host process is not running.
pub const HOST_UNAVAILABLE: i32 = 3;

/// The host process exists but did not answer the readiness query.
pub const HOST_UNRESPONSIVE: i32 = 4;

/// Every execution strategy failed; a manual launcher may have been written.
pub const EXECUTION_FAILURE: i32 = 5;
