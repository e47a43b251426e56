//! # Task Store and Validator
//!
//! **The durable core of the dependency-aware task orchestrator.**
//!
//! This crate provides the `TaskStore` trait and its in-memory and SQLite
//! implementations, the submission validator (cycle detection and
//! initial-status assignment), and the status state machine they both rely
//! on. The scheduler, runner, recovery routine, and HTTP transport all live
//! in sibling crates and depend on this one.
//!
//! ## Quick start
//!
//! ```rust
//! use orchestrator_core::prelude::*;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = InMemoryTaskStore::new();
//!
//! let submission = TaskSubmission {
//!     id: Some("a".to_string()),
//!     task_type: Some("noop".to_string()),
//!     duration_ms: Some(0.into()),
//!     dependencies: None,
//! };
//!
//! let known = store.list_all().await?;
//! validate(&submission, &known).map_err(|e| StoreError::Database(e.to_string()))?;
//! let task = materialize(&submission, &known);
//! store.insert(task).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod prelude;
pub mod state_machine;
pub mod store;
pub mod task;
pub mod validator;

#[cfg(feature = "in-memory")]
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use error::{StoreError, ValidationError};
pub use state_machine::validate_transition;
pub use store::{InsertOutcome, StoreStats, TaskStore};
pub use task::{now_ms, StatusUpdate, Task, TaskStatus, UpdateOutcome};
pub use validator::{materialize, validate, TaskSubmission};

#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryTaskStore;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteStoreConfig, SqliteTaskStore};
