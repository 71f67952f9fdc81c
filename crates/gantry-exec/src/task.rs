//! Task types and the executor seam

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gantry_core::TaskId;

/// Opaque payload carried by a task, interpreted only by the caller's executor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum TaskPayload {
    /// Shell command to run
    Shell(String),
    /// Structured data for the executor
    Json(serde_json::Value),
    /// No payload
    #[default]
    Empty,
}

/// One schedulable, independent unit of test work.
///
/// Immutable after submission; the scheduler never changes a task, it only
/// records results about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,

    /// Scheduling priority; higher runs first
    #[serde(default)]
    pub priority: i32,

    /// Tasks that must have a terminal result before this one is runnable
    #[serde(default)]
    pub dependencies: HashSet<TaskId>,

    /// Whether this task must run alone, never concurrently with any other
    #[serde(default)]
    pub requires_serialization: bool,

    /// Per-task retry budget (capped by the global retry ceiling)
    #[serde(default)]
    pub max_retries: u32,

    /// Opaque payload for the executor
    #[serde(default)]
    pub payload: TaskPayload,
}

impl Task {
    /// Create a new task with default settings
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            dependencies: HashSet::new(),
            requires_serialization: false,
            max_retries: 0,
            payload: TaskPayload::Empty,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency on another task
    pub fn with_dependency(mut self, dep: impl Into<TaskId>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Mark this task as requiring serialized execution
    pub fn serialized(mut self) -> Self {
        self.requires_serialization = true;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the payload
    pub fn with_payload(mut self, payload: TaskPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The task itself reported a failure
    Logic,
    /// The attempt exceeded the per-task deadline
    Timeout,
    /// The execution harness crashed (panic, not a reported failure)
    Crash,
    /// The task was in flight or queued when shutdown was requested
    Shutdown,
}

/// What one execution attempt reported back
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Whether the attempt succeeded
    pub success: bool,
    /// Error message on failure
    pub error: Option<String>,
    /// Wall time of the attempt
    pub duration: Duration,
    /// Failure classification; `None` on success
    pub failure: Option<FailureKind>,
    /// Identifier of the sandbox the attempt ran in, if any
    pub sandbox_id: Option<String>,
}

impl TaskOutcome {
    /// A successful attempt
    pub fn passed(duration: Duration) -> Self {
        Self {
            success: true,
            error: None,
            duration,
            failure: None,
            sandbox_id: None,
        }
    }

    /// A task-logic failure
    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration,
            failure: Some(FailureKind::Logic),
            sandbox_id: None,
        }
    }

    /// A deadline-exceeded failure, distinct from a task-logic failure
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            success: false,
            error: Some(format!("timed out after {}ms", timeout.as_millis())),
            duration: timeout,
            failure: Some(FailureKind::Timeout),
            sandbox_id: None,
        }
    }

    /// An execution-harness crash
    pub fn crashed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration,
            failure: Some(FailureKind::Crash),
            sandbox_id: None,
        }
    }

    /// A shutdown-induced failure; never retried
    pub fn aborted_by_shutdown() -> Self {
        Self {
            success: false,
            error: Some("aborted by scheduler shutdown".to_string()),
            duration: Duration::ZERO,
            failure: Some(FailureKind::Shutdown),
            sandbox_id: None,
        }
    }

    /// Attach the sandbox the attempt ran in
    pub fn with_sandbox_id(mut self, id: impl Into<String>) -> Self {
        self.sandbox_id = Some(id.into());
        self
    }
}

/// The caller-supplied execution mechanism.
///
/// Performs the actual work for one task and reports success/failure plus
/// duration. The scheduler owns timeout enforcement and retries; an executor
/// only runs a single attempt.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute one attempt of the given task
    async fn execute(&self, task: &Task) -> TaskOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new("get-users")
            .with_priority(5)
            .with_dependency("setup-db")
            .serialized()
            .with_max_retries(3)
            .with_payload(TaskPayload::Shell("curl localhost".to_string()));

        assert_eq!(task.id.as_str(), "get-users");
        assert_eq!(task.priority, 5);
        assert!(task.dependencies.contains(&TaskId::new("setup-db")));
        assert!(task.requires_serialization);
        assert_eq!(task.max_retries, 3);
    }

    #[test]
    fn test_task_defaults() {
        let task = Task::new("t");
        assert_eq!(task.priority, 0);
        assert!(task.dependencies.is_empty());
        assert!(!task.requires_serialization);
        assert_eq!(task.max_retries, 0);
        assert!(matches!(task.payload, TaskPayload::Empty));
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = TaskOutcome::passed(Duration::from_millis(10));
        assert!(ok.success);
        assert!(ok.failure.is_none());

        let failed = TaskOutcome::failed("assertion failed", Duration::from_millis(5));
        assert!(!failed.success);
        assert_eq!(failed.failure, Some(FailureKind::Logic));

        let timeout = TaskOutcome::timed_out(Duration::from_secs(1));
        assert_eq!(timeout.failure, Some(FailureKind::Timeout));

        let shutdown = TaskOutcome::aborted_by_shutdown();
        assert_eq!(shutdown.failure, Some(FailureKind::Shutdown));
    }
}
