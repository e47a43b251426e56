//! Core task store trait and supporting types.
//!
//! Defines the `TaskStore` trait implemented by the in-memory and SQLite
//! backends. All mutation goes through `update_status`; there is no other
//! way to change a task once inserted.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::task::{StatusUpdate, Task, TaskStatus, UpdateOutcome};

/// Result of an `insert` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Task),
    AlreadyExists,
}

/// Task counts by status, as returned by `/api/stats`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub waiting: u64,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StoreStats {
    pub fn total(&self) -> u64 {
        self.waiting + self.queued + self.running + self.completed + self.failed
    }

    pub fn increment(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Waiting => self.waiting += 1,
            TaskStatus::Queued => self.queued += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

/// Durable, crash-safe keyed repository of task records.
///
/// Implementations must be `Send + Sync`: the scheduler, HTTP layer, and
/// recovery routine all hold a shared `Arc<dyn TaskStore>`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Human-readable name of the backend (e.g. "in-memory", "sqlite").
    fn backend_name(&self) -> &'static str;

    /// Insert a new task at `version = 0`. Rejects on id collision.
    async fn insert(&self, task: Task) -> Result<InsertOutcome, StoreError>;

    /// Fetch a task by id.
    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Fetch a task along with its version, for use before an update.
    async fn get_with_version(&self, id: &str) -> Result<Option<(Task, u64)>, StoreError> {
        Ok(self.get(id).await?.map(|t| {
            let version = t.version;
            (t, version)
        }))
    }

    /// All tasks, ordered by `created_at` ascending (ties by id).
    async fn list_all(&self) -> Result<Vec<Task>, StoreError>;

    /// All tasks with the given status, ordered by `created_at` ascending.
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, StoreError>;

    /// Tasks in WAITING or QUEUED whose dependencies are all COMPLETED,
    /// ordered by `created_at` ascending (ties by id).
    ///
    /// The default implementation loads the full table and filters in
    /// memory; backends with an index on `status` may override this with a
    /// narrower query, as long as the readiness semantics are preserved
    /// exactly (see the open question on `list_ready` in the crate design
    /// notes).
    async fn list_ready(&self) -> Result<Vec<Task>, StoreError> {
        let all = self.list_all().await?;
        let completed: std::collections::HashSet<String> = all
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();

        let mut ready: Vec<Task> = all
            .into_iter()
            .filter(|t| {
                matches!(t.status, TaskStatus::Waiting | TaskStatus::Queued)
                    && t.deps_satisfied(&completed)
            })
            .collect();
        ready.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(ready)
    }

    /// Version-gated status transition. Returns `Claimed` iff `expected_version`
    /// matched the stored version, in which case the version is incremented by
    /// exactly one and `updates` is applied; returns `Stale` otherwise.
    async fn update_status(
        &self,
        id: &str,
        new_status: TaskStatus,
        expected_version: u64,
        updates: StatusUpdate,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Count of tasks by status.
    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Release any underlying resources (connection pools, file handles).
    async fn close(&self) -> Result<(), StoreError>;
}

/// Helper used by backends to apply a `StatusUpdate` onto a `Task` in place.
pub(crate) fn apply_update(task: &mut Task, new_status: TaskStatus, updates: &StatusUpdate) {
    task.status = new_status;
    task.version += 1;
    if let Some(v) = updates.started_at {
        task.started_at = v;
    }
    if let Some(v) = updates.completed_at {
        task.completed_at = v;
    }
    if let Some(v) = updates.error.clone() {
        task.error = v;
    }
    if let Some(v) = updates.retry_count {
        task.retry_count = v;
    }
}
