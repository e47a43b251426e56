//! Convenience re-exports for common downstream usage.

pub use crate::error::{StoreError, ValidationError};
pub use crate::state_machine::validate_transition;
pub use crate::store::{InsertOutcome, StoreStats, TaskStore};
pub use crate::task::{now_ms, StatusUpdate, Task, TaskStatus, UpdateOutcome};
pub use crate::validator::{materialize, validate, TaskSubmission};

#[cfg(feature = "in-memory")]
pub use crate::in_memory::InMemoryTaskStore;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteStoreConfig, SqliteTaskStore};
