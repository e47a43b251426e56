//! Crash-recovery routine: runs once at startup, before the scheduler's
//! first tick.

use orchestrator_core::{StatusUpdate, StoreError, Task, TaskStatus, TaskStore, UpdateOutcome};
use tracing::info;

/// List every task in RUNNING and move it back to QUEUED, clearing
/// `started_at` and recording the interruption marker on `error`.
///
/// A `Stale` result on any individual task is acceptable and ignored — it
/// means some other actor already moved the task since recovery listed it.
/// Running this twice in succession is idempotent: the second pass finds no
/// RUNNING tasks left to recover.
pub async fn recover_interrupted_tasks(store: &dyn TaskStore) -> Result<Vec<String>, StoreError> {
    let running = store.list_by_status(TaskStatus::Running).await?;
    let mut recovered = Vec::new();

    for task in running {
        let outcome = store
            .update_status(
                &task.id,
                TaskStatus::Queued,
                task.version,
                StatusUpdate::default()
                    .clear_started_at()
                    .set_error(Task::RECOVERY_ERROR_MESSAGE),
            )
            .await?;

        match outcome {
            UpdateOutcome::Claimed(_) => recovered.push(task.id),
            UpdateOutcome::Stale => {
                // Another actor already moved this task; nothing to do.
            }
        }
    }

    if !recovered.is_empty() {
        info!(count = recovered.len(), "Recovered interrupted tasks on startup");
    }

    Ok(recovered)
}
