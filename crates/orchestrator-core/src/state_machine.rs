//! Task status transition rules (I4–I7).
//!
//! ```text
//! WAITING  -> QUEUED | RUNNING
//! QUEUED   -> RUNNING
//! RUNNING  -> QUEUED (recovery only) | COMPLETED | FAILED
//! COMPLETED / FAILED -> terminal, no further transitions
//! ```

use crate::error::StoreError;
use crate::task::TaskStatus;

/// Validate a task status transition. Returns `Ok(())` if `from -> to` is
/// allowed, `Err` otherwise.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), StoreError> {
    use TaskStatus::*;

    let allowed = match from {
        Waiting => matches!(to, Queued | Running),
        Queued => matches!(to, Running),
        Running => matches!(to, Queued | Completed | Failed),
        Completed | Failed => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(StoreError::Database(format!(
            "invalid transition: {:?} -> {:?}",
            from, to
        )))
    }
}
