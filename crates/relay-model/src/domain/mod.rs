mod id;
pub use id::{AccountId, CallbackToken, PerpetualTaskId, TaskId, WorkerId};

mod labels;
pub use labels::Labels;

mod constants;
pub use constants::{LABEL_STAGE_ID, LABEL_WORKFLOW_EXECUTION_ID, ORIGIN_DEFAULT};

use std::time::{SystemTime, UNIX_EPOCH};

/// Timeout value in milliseconds.
pub type TimeoutMs = u64;

/// Wall-clock timestamp in milliseconds since the unix epoch.
///
/// All record timestamps (creation, expiry, dispatch, completion) use this unit.
pub type UnixMs = u64;

/// Current wall-clock time in unix milliseconds.
///
/// A clock set before the epoch yields `0` rather than an error.
pub fn now_ms() -> UnixMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as UnixMs)
        .unwrap_or_default()
}
