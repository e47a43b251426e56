//! The polling scheduler: discovers ready tasks, bounds concurrency, and
//! drives status transitions by claiming tasks and handing them to a
//! [`Runner`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orchestrator_core::{now_ms, StatusUpdate, StoreError, Task, TaskStatus, TaskStore, UpdateOutcome};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, warn};

use crate::runner::{RunOutcome, Runner};

/// Tunables for the scheduling loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Long-running loop that claims ready tasks and executes them under a
/// fixed concurrency bound.
///
/// `in_flight` is process-wide state with a clear lifecycle: empty at
/// construction, populated by successful claims, drained by runner
/// completions. It lives as an instance field, guarded by a `tokio::sync::Mutex`
/// since runner completions race on separately spawned tasks.
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn Runner>,
    config: SchedulerConfig,
    in_flight: Mutex<HashSet<String>>,
    stopped: AtomicBool,
    /// Signaled by a runner completion to trigger an immediate extra pass,
    /// rather than waiting for the next timer tick.
    notify: Notify,
}

impl Scheduler {
    pub fn new(store: Arc<dyn TaskStore>, runner: Arc<dyn Runner>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            runner,
            config,
            in_flight: Mutex::new(HashSet::new()),
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Ids currently in flight, for `/api/stats`.
    pub async fn in_flight_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.in_flight.lock().await.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn slots_available(&self) -> usize {
        self.config
            .max_concurrent
            .saturating_sub(self.in_flight.lock().await.len())
    }

    /// Stop further scheduling ticks. Does not cancel in-flight runners —
    /// they complete naturally and write their own terminal state.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wake the scheduling loop immediately instead of waiting for the next
    /// timer tick. Called by the HTTP layer right after a submission so a
    /// freshly QUEUED task with a free slot doesn't sit idle.
    pub fn tick_soon(&self) {
        self.notify.notify_one();
    }

    /// Run the scheduling loop until `stop()` is called.
    pub async fn run(self: Arc<Self>) -> Result<(), StoreError> {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if self.is_stopped() {
                return Ok(());
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = self.notify.notified() => {}
            }

            if self.is_stopped() {
                return Ok(());
            }

            self.tick().await?;
        }
    }

    /// One scheduling pass: compute free slots, fetch ready tasks, and
    /// attempt to claim up to `free` of them, FIFO by `created_at` then id.
    pub async fn tick(self: &Arc<Self>) -> Result<(), StoreError> {
        let free = self.slots_available().await;
        if free == 0 {
            return Ok(());
        }

        let ready = self.store.list_ready().await?;

        for task in ready.into_iter().take(free) {
            self.try_claim(task).await?;
        }

        Ok(())
    }

    async fn try_claim(self: &Arc<Self>, task: Task) -> Result<(), StoreError> {
        let now = now_ms();
        let outcome = self
            .store
            .update_status(
                &task.id,
                TaskStatus::Running,
                task.version,
                StatusUpdate::default().set_started_at(now),
            )
            .await?;

        match outcome {
            UpdateOutcome::Claimed(claimed) => {
                self.in_flight.lock().await.insert(claimed.id.clone());
                debug!(task_id = %claimed.id, "claimed task");
                self.spawn_runner(claimed);
            }
            UpdateOutcome::Stale => {
                // Another cycle or a racing submission already advanced it.
                debug!(task_id = %task.id, "claim attempt was stale, skipping");
            }
        }

        Ok(())
    }

    fn spawn_runner(self: &Arc<Self>, task: Task) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = scheduler.runner.run(&task).await;

            if let Err(e) = scheduler.finish(&task, outcome).await {
                error!(task_id = %task.id, error = %e, "failed to write terminal task status");
            }

            scheduler.in_flight.lock().await.remove(&task.id);
            // One additional scheduling pass right away, instead of waiting
            // for the next timer tick, so a freed slot is reused promptly.
            scheduler.notify.notify_one();
        });
    }

    async fn finish(&self, task: &Task, outcome: RunOutcome) -> Result<(), StoreError> {
        // Re-fetch the version rather than assuming claim_version + 1.
        let current = self
            .store
            .get(&task.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(task.id.clone()))?;

        let now = now_ms();
        let (status, updates) = match outcome {
            RunOutcome::Success => (
                TaskStatus::Completed,
                StatusUpdate::default().set_completed_at(now),
            ),
            RunOutcome::Failure(message) => (
                TaskStatus::Failed,
                StatusUpdate::default().set_completed_at(now).set_error(message),
            ),
        };

        let result = self
            .store
            .update_status(&task.id, status, current.version, updates)
            .await?;

        if matches!(result, UpdateOutcome::Stale) {
            warn!(task_id = %task.id, "terminal write found a stale version; task left unresolved");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::InMemoryTaskStore;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountingRunner {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Runner for CountingRunner {
        async fn run(&self, _task: &Task) -> RunOutcome {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            RunOutcome::Success
        }
    }

    struct FailingRunner;

    #[async_trait::async_trait]
    impl Runner for FailingRunner {
        async fn run(&self, _task: &Task) -> RunOutcome {
            RunOutcome::Failure("boom".to_string())
        }
    }

    fn task_with_deps(id: &str, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            task_type: "noop".to_string(),
            duration_ms: 0,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            status: if deps.is_empty() {
                TaskStatus::Queued
            } else {
                TaskStatus::Waiting
            },
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
            error: None,
            retry_count: 0,
            version: 0,
        }
    }

    #[tokio::test]
    async fn tick_claims_up_to_free_slots() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.insert(task_with_deps("a", &[])).await.unwrap();
        store.insert(task_with_deps("b", &[])).await.unwrap();
        store.insert(task_with_deps("c", &[])).await.unwrap();

        let runner = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            runner,
            SchedulerConfig {
                max_concurrent: 2,
                poll_interval: Duration::from_millis(10),
            },
        );

        scheduler.tick().await.unwrap();

        let running = store.list_by_status(TaskStatus::Running).await.unwrap();
        assert_eq!(running.len(), 2);
        assert_eq!(scheduler.in_flight_ids().await.len(), 2);
    }

    #[tokio::test]
    async fn does_not_claim_waiting_task_with_incomplete_deps() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.insert(task_with_deps("a", &[])).await.unwrap();
        store.insert(task_with_deps("b", &["a"])).await.unwrap();

        let runner = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            runner,
            SchedulerConfig {
                max_concurrent: 5,
                poll_interval: Duration::from_millis(10),
            },
        );

        scheduler.tick().await.unwrap();

        let b = store.get("b").await.unwrap().unwrap();
        assert_eq!(b.status, TaskStatus::Waiting);
    }

    #[tokio::test]
    async fn claims_waiting_task_once_dependency_completes() {
        let store = Arc::new(InMemoryTaskStore::new());
        let mut a = task_with_deps("a", &[]);
        a.status = TaskStatus::Completed;
        store.insert(a).await.unwrap();
        store.insert(task_with_deps("b", &["a"])).await.unwrap();

        let runner = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            runner,
            SchedulerConfig {
                max_concurrent: 5,
                poll_interval: Duration::from_millis(10),
            },
        );

        scheduler.tick().await.unwrap();

        let b = store.get("b").await.unwrap().unwrap();
        assert_eq!(b.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn runner_failure_writes_failed_status_with_error() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.insert(task_with_deps("a", &[])).await.unwrap();

        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(FailingRunner),
            SchedulerConfig {
                max_concurrent: 1,
                poll_interval: Duration::from_millis(10),
            },
        );

        scheduler.tick().await.unwrap();

        // Give the spawned runner task a chance to complete.
        for _ in 0..50 {
            if store.get("a").await.unwrap().unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let task = store.get("a").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn zero_free_slots_claims_nothing() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.insert(task_with_deps("a", &[])).await.unwrap();

        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(CountingRunner {
                calls: AtomicUsize::new(0),
            }),
            SchedulerConfig {
                max_concurrent: 0,
                poll_interval: Duration::from_millis(10),
            },
        );

        scheduler.tick().await.unwrap();

        let task = store.get("a").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
    }
}
