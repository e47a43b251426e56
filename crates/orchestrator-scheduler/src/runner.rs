//! Runner abstraction — the pluggable contract for executing a claimed task.
//!
//! Separates *how tasks run* from *how tasks are stored and scheduled*, the
//! same split this workspace draws between its task storage crate and the
//! executor trait used by its server runtime.

use async_trait::async_trait;
use orchestrator_core::Task;

/// Terminal outcome of running a single task.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Success,
    Failure(String),
}

/// Executes a claimed task and reports its terminal outcome.
///
/// Implementations must be `Send + Sync`: the scheduler holds one shared
/// `Arc<dyn Runner>` and spawns it onto its own tokio task per claim so a
/// slow runner can never block the scheduling tick.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, task: &Task) -> RunOutcome;
}

/// Reference runner: sleeps for `duration_ms` and reports success.
///
/// Stands in for real work (a job queue consumer, a subprocess, an external
/// API call); users of this crate provide their own `Runner` for anything
/// beyond the reference behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepRunner;

#[async_trait]
impl Runner for SleepRunner {
    async fn run(&self, task: &Task) -> RunOutcome {
        tokio::time::sleep(std::time::Duration::from_millis(task.duration_ms)).await;
        RunOutcome::Success
    }
}
