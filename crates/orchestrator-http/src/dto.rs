//! Wire shapes for the HTTP API that aren't already covered by `Task` itself.

use serde::Serialize;

use orchestrator_core::{now_ms, StoreStats, Task};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into() }
    }
}

/// `POST /api/tasks` success response.
#[derive(Debug, Serialize)]
pub struct SubmitBody {
    pub message: &'static str,
    pub task: Task,
}

/// `GET /api/tasks?status=` response.
#[derive(Debug, Serialize)]
pub struct TaskListBody {
    pub total: usize,
    pub tasks: Vec<Task>,
}

impl TaskListBody {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            total: tasks.len(),
            tasks,
        }
    }
}

/// `/api/stats` response: store counts plus the scheduler's live concurrency state.
#[derive(Debug, Serialize)]
pub struct StatsBody {
    #[serde(flatten)]
    pub store: StoreStats,
    pub backend: &'static str,
    pub max_concurrent_tasks: usize,
    pub slots_available: usize,
    pub currently_running: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub timestamp: i64,
}

impl Default for HealthBody {
    fn default() -> Self {
        Self {
            status: "ok",
            timestamp: now_ms(),
        }
    }
}
