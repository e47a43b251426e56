//! Submission validator: gatekeeps new tasks and computes their initial status.
//!
//! Pure with respect to a store snapshot — `validate` takes the list of all
//! currently-known tasks and never talks to the store itself, so callers
//! control exactly which snapshot the cycle check and existence checks run
//! against.

use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::task::{now_ms, Task, TaskStatus};

/// Raw, not-yet-validated submission, as decoded from the HTTP request body.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TaskSubmission {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub duration_ms: Option<serde_json::Number>,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

/// Validate a submission against a snapshot of all known tasks.
///
/// Checks run in the order documented in the component design: the first
/// failure wins and later checks are skipped, so the error returned always
/// names the first problem a caller would need to fix.
pub fn validate(submission: &TaskSubmission, known: &[Task]) -> Result<(), ValidationError> {
    let id = submission
        .id
        .as_ref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingId)?;

    submission
        .task_type
        .as_ref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingType)?;

    let duration_ok = submission
        .duration_ms
        .as_ref()
        .and_then(|n| n.as_i64())
        .is_some_and(|n| n >= 0);
    if !duration_ok {
        return Err(ValidationError::InvalidDuration);
    }

    let existing: HashMap<&str, &Task> = known.iter().map(|t| (t.id.as_str(), t)).collect();

    if existing.contains_key(id.as_str()) {
        return Err(ValidationError::DuplicateId(id.clone()));
    }

    let dependencies = submission.dependencies.clone().unwrap_or_default();
    for dep in &dependencies {
        if dep.is_empty() {
            return Err(ValidationError::InvalidDependency);
        }
    }

    for dep in &dependencies {
        if dep == id {
            return Err(ValidationError::SelfDependency(dep.clone()));
        }
    }

    for dep in &dependencies {
        if !existing.contains_key(dep.as_str()) {
            return Err(ValidationError::UnknownDependency(dep.clone()));
        }
    }

    if let Some(cycle_through) = find_cycle(id, &dependencies, &existing) {
        return Err(ValidationError::CycleDetected(cycle_through));
    }

    Ok(())
}

/// Depth-first search from each dependency, looking for a path back to `id`.
///
/// Edges point from a task to its dependencies (the direction the graph is
/// walked in), so a cycle exists iff `id` is reachable from one of its own
/// proposed dependencies. Returns the id of the dependency whose search
/// found the cycle, for use in the rejection message. O(V+E).
fn find_cycle(id: &str, dependencies: &[String], existing: &HashMap<&str, &Task>) -> Option<String> {
    for start in dependencies {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack = vec![start.as_str()];

        while let Some(node) = stack.pop() {
            if node == id {
                return Some(start.clone());
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(task) = existing.get(node) {
                for next in &task.dependencies {
                    stack.push(next.as_str());
                }
            }
        }
    }
    None
}

/// Build the initial `Task` record for an already-validated submission.
///
/// QUEUED if `dependencies` is empty or every dependency is already
/// COMPLETED in the same snapshot the cycle check observed; WAITING
/// otherwise. A later background change to a dependency's status is
/// reconciled by the scheduler's readiness check, not by re-running this
/// function.
pub fn materialize(submission: &TaskSubmission, known: &[Task]) -> Task {
    let existing: HashMap<&str, &Task> = known.iter().map(|t| (t.id.as_str(), t)).collect();
    let dependencies = submission.dependencies.clone().unwrap_or_default();

    let all_completed = dependencies.iter().all(|d| {
        existing
            .get(d.as_str())
            .map(|t| t.status == TaskStatus::Completed)
            .unwrap_or(false)
    });

    let status = if all_completed {
        TaskStatus::Queued
    } else {
        TaskStatus::Waiting
    };

    Task {
        id: submission.id.clone().expect("validated: id present"),
        task_type: submission.task_type.clone().expect("validated: type present"),
        duration_ms: submission
            .duration_ms
            .as_ref()
            .and_then(|n| n.as_i64())
            .expect("validated: duration_ms present") as u64,
        dependencies,
        status,
        created_at: now_ms(),
        started_at: None,
        completed_at: None,
        error: None,
        retry_count: 0,
        version: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            task_type: "x".to_string(),
            duration_ms: 0,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            status,
            created_at: 0,
            started_at: None,
            completed_at: None,
            error: None,
            retry_count: 0,
            version: 0,
        }
    }

    fn submission(id: &str, deps: &[&str]) -> TaskSubmission {
        TaskSubmission {
            id: Some(id.to_string()),
            task_type: Some("x".to_string()),
            duration_ms: Some(serde_json::Number::from(0)),
            dependencies: Some(deps.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn rejects_missing_id() {
        let sub = TaskSubmission {
            id: None,
            task_type: Some("x".into()),
            duration_ms: Some(0.into()),
            dependencies: None,
        };
        assert_eq!(validate(&sub, &[]), Err(ValidationError::MissingId));
    }

    #[test]
    fn rejects_negative_duration() {
        let sub = TaskSubmission {
            id: Some("a".into()),
            task_type: Some("x".into()),
            duration_ms: Some(serde_json::Number::from(-1)),
            dependencies: None,
        };
        assert_eq!(validate(&sub, &[]), Err(ValidationError::InvalidDuration));
    }

    #[test]
    fn rejects_duplicate_id() {
        let known = vec![task("a", TaskStatus::Queued, &[])];
        let sub = submission("a", &[]);
        assert_eq!(
            validate(&sub, &known),
            Err(ValidationError::DuplicateId("a".into()))
        );
    }

    #[test]
    fn rejects_self_dependency() {
        let sub = submission("a", &["a"]);
        assert_eq!(
            validate(&sub, &[]),
            Err(ValidationError::SelfDependency("a".into()))
        );
    }

    #[test]
    fn rejects_unknown_dependency() {
        let sub = submission("a", &["missing"]);
        assert_eq!(
            validate(&sub, &[]),
            Err(ValidationError::UnknownDependency("missing".into()))
        );
    }

    #[test]
    fn rejects_cycle() {
        // a -> (none), b depends on a, c depends on b.
        // Submitting "d" with dependencies ["c", "a"] where "a" is made to
        // depend on "d" would close a loop; we exercise the detector
        // directly by asking whether c is reachable from b (it is, via the
        // existing chain), simulating the rejection of a closing edge.
        let known = vec![
            task("a", TaskStatus::Queued, &[]),
            task("b", TaskStatus::Waiting, &["a"]),
            task("c", TaskStatus::Waiting, &["b"]),
        ];
        // "a" attempting to depend on "c" would close a -> c -> b -> a.
        let existing: HashMap<&str, &Task> = known.iter().map(|t| (t.id.as_str(), t)).collect();
        let cycle = find_cycle("a", &["c".to_string()], &existing);
        assert_eq!(cycle, Some("c".to_string()));
    }

    #[test]
    fn accepts_valid_chain_and_queues_when_no_deps() {
        let sub = submission("a", &[]);
        assert!(validate(&sub, &[]).is_ok());
        let materialized = materialize(&sub, &[]);
        assert_eq!(materialized.status, TaskStatus::Queued);
    }

    #[test]
    fn waits_when_dependency_incomplete() {
        let known = vec![task("a", TaskStatus::Queued, &[])];
        let sub = submission("b", &["a"]);
        assert!(validate(&sub, &known).is_ok());
        let materialized = materialize(&sub, &known);
        assert_eq!(materialized.status, TaskStatus::Waiting);
    }

    #[test]
    fn queues_when_all_dependencies_completed() {
        let known = vec![task("a", TaskStatus::Completed, &[])];
        let sub = submission("b", &["a"]);
        let materialized = materialize(&sub, &known);
        assert_eq!(materialized.status, TaskStatus::Queued);
    }
}
