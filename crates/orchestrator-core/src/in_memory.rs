//! In-memory task store backend.
//!
//! Suitable for development, testing, and zero-configuration startup. Tasks
//! are stored in a `HashMap` behind a `tokio::sync::RwLock`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::state_machine::validate_transition;
use crate::store::{apply_update, InsertOutcome, StoreStats, TaskStore};
use crate::task::{StatusUpdate, Task, TaskStatus, UpdateOutcome};

/// In-memory task store. Cheaply `Clone`-able; all clones share the same
/// underlying map.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn insert(&self, task: Task) -> Result<InsertOutcome, StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(InsertOutcome::Inserted(task))
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut filtered: Vec<Task> = tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(filtered)
    }

    async fn update_status(
        &self,
        id: &str,
        new_status: TaskStatus,
        expected_version: u64,
        updates: StatusUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tasks = self.tasks.write().await;

        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if task.version != expected_version {
            return Ok(UpdateOutcome::Stale);
        }

        validate_transition(task.status, new_status)?;

        apply_update(task, new_status, &updates);

        Ok(UpdateOutcome::Claimed(task.clone()))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let tasks = self.tasks.read().await;
        let mut stats = StoreStats::default();
        for task in tasks.values() {
            stats.increment(task.status);
        }
        Ok(stats)
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
