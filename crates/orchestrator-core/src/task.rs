//! Task domain model and status state machine.

use serde::{Deserialize, Serialize};

/// Status of a task in the orchestrator's lifecycle.
///
/// See the state machine in the crate documentation: WAITING and QUEUED are
/// the only non-terminal, pre-execution states; COMPLETED and FAILED are
/// terminal and accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Waiting,
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `true` for COMPLETED and FAILED, the two states a task never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Waiting => "WAITING",
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(TaskStatus::Waiting),
            "QUEUED" => Some(TaskStatus::Queued),
            "RUNNING" => Some(TaskStatus::Running),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// Persistence model for a task. Contains only serializable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub duration_ms: u64,
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub version: u64,
}

impl Task {
    /// The message recorded on a task's `error` field by the recovery routine.
    pub const RECOVERY_ERROR_MESSAGE: &'static str = "Task was interrupted by system restart";

    /// `true` if every entry in `completed_ids` covers this task's dependency set.
    pub fn deps_satisfied(&self, completed_ids: &std::collections::HashSet<String>) -> bool {
        self.dependencies.iter().all(|d| completed_ids.contains(d))
    }
}

/// Partial field updates applied atomically alongside a status transition.
///
/// Mirrors the `partial_updates` parameter to `Store.update_status`: only the
/// fields present are written, everything else on the stored row is left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub started_at: Option<Option<i64>>,
    pub completed_at: Option<Option<i64>>,
    pub error: Option<Option<String>>,
    pub retry_count: Option<u32>,
}

impl StatusUpdate {
    pub fn set_started_at(mut self, at: i64) -> Self {
        self.started_at = Some(Some(at));
        self
    }

    pub fn clear_started_at(mut self) -> Self {
        self.started_at = Some(None);
        self
    }

    pub fn set_completed_at(mut self, at: i64) -> Self {
        self.completed_at = Some(Some(at));
        self
    }

    pub fn set_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(Some(message.into()));
        self
    }
}

/// Result of [`crate::store::TaskStore::update_status`]: the version-gated
/// write either claimed the row or found it already moved out from under it.
///
/// `StaleUpdate` is a normal return value, not an error — callers branch on
/// it rather than propagating it with `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Claimed(Task),
    Stale,
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            TaskStatus::Waiting,
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn deps_satisfied_empty_is_true() {
        let task = Task {
            id: "a".into(),
            task_type: "x".into(),
            duration_ms: 0,
            dependencies: vec![],
            status: TaskStatus::Queued,
            created_at: 0,
            started_at: None,
            completed_at: None,
            error: None,
            retry_count: 0,
            version: 0,
        };
        assert!(task.deps_satisfied(&Default::default()));
    }
}
