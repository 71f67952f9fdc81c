//! Task queue and dependency resolution
//!
//! Pending work is partitioned into a strictly-serial class and a
//! parallel-eligible class. Both are kept sorted by descending priority with
//! submission order breaking ties, so draining is deterministic.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use gantry_core::{QueueError, TaskId};

use crate::task::Task;

/// A task that could not be scheduled because its dependencies never resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckTask {
    /// The blocked task
    pub id: TaskId,
    /// Dependencies that never reached a terminal result
    pub missing: Vec<TaskId>,
}

/// Priority/dependency-aware task queue
#[derive(Debug, Default)]
pub struct TaskQueue {
    serialized: Vec<Task>,
    parallel: Vec<Task>,
    seen: HashSet<TaskId>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task into the serialized or parallel class.
    ///
    /// Both classes stay sorted by descending priority after every insertion;
    /// among equal priorities, earlier submissions drain first.
    pub fn submit(&mut self, task: Task) -> Result<(), QueueError> {
        if !self.seen.insert(task.id.clone()) {
            return Err(QueueError::DuplicateTask(task.id.to_string()));
        }

        debug!(
            task = %task.id,
            priority = task.priority,
            serialized = task.requires_serialization,
            "task submitted"
        );

        let list = if task.requires_serialization {
            &mut self.serialized
        } else {
            &mut self.parallel
        };
        let pos = list
            .iter()
            .position(|t| t.priority < task.priority)
            .unwrap_or(list.len());
        list.insert(pos, task);
        Ok(())
    }

    /// Total number of queued tasks
    pub fn len(&self) -> usize {
        self.serialized.len() + self.parallel.len()
    }

    /// Whether the queue holds no tasks
    pub fn is_empty(&self) -> bool {
        self.serialized.is_empty() && self.parallel.is_empty()
    }

    /// Whether any serialized tasks remain
    pub fn has_serialized(&self) -> bool {
        !self.serialized.is_empty()
    }

    /// Number of queued serialized tasks
    pub fn serialized_len(&self) -> usize {
        self.serialized.len()
    }

    /// Number of queued parallel-eligible tasks
    pub fn parallel_len(&self) -> usize {
        self.parallel.len()
    }

    /// Whether any parallel-eligible tasks remain
    pub fn has_parallel(&self) -> bool {
        !self.parallel.is_empty()
    }

    /// Take the next serialized task.
    ///
    /// Serialized tasks drain strictly before any parallel task begins, one
    /// at a time, each to a terminal result.
    pub fn next_serialized(&mut self) -> Option<Task> {
        if self.serialized.is_empty() {
            None
        } else {
            Some(self.serialized.remove(0))
        }
    }

    /// Take the highest-priority parallel task whose dependencies are all in
    /// `resolved` (completed or permanently failed).
    ///
    /// Returns `None` when no queued task is runnable yet; blocked tasks stay
    /// queued and are skipped until their dependencies resolve, so callers
    /// re-poll after the next completion.
    pub fn next_runnable(&mut self, resolved: &HashSet<TaskId>) -> Option<Task> {
        let pos = self
            .parallel
            .iter()
            .position(|t| t.dependencies.iter().all(|d| resolved.contains(d)))?;
        Some(self.parallel.remove(pos))
    }

    /// Diagnostic for tasks that can never run: every still-queued parallel
    /// task together with its unresolved dependencies.
    ///
    /// Surfaced at drain time instead of deadlocking silently.
    pub fn stuck_report(&self, resolved: &HashSet<TaskId>) -> Vec<StuckTask> {
        self.parallel
            .iter()
            .map(|t| {
                let mut missing: Vec<TaskId> = t
                    .dependencies
                    .iter()
                    .filter(|d| !resolved.contains(*d))
                    .cloned()
                    .collect();
                missing.sort();
                StuckTask {
                    id: t.id.clone(),
                    missing,
                }
            })
            .collect()
    }

    /// Remove and return every remaining task, serialized first.
    ///
    /// Used on shutdown so queued-but-never-started tasks can be tagged
    /// rather than silently dropped.
    pub fn drain(&mut self) -> Vec<Task> {
        let mut remaining = std::mem::take(&mut self.serialized);
        remaining.append(&mut self.parallel);
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(ids: &[&str]) -> HashSet<TaskId> {
        ids.iter().map(|s| TaskId::new(*s)).collect()
    }

    #[test]
    fn test_submit_partitions_classes() {
        let mut queue = TaskQueue::new();
        queue.submit(Task::new("a")).unwrap();
        queue.submit(Task::new("b").serialized()).unwrap();

        assert!(queue.has_serialized());
        assert!(queue.has_parallel());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let mut queue = TaskQueue::new();
        queue.submit(Task::new("a")).unwrap();
        assert!(matches!(
            queue.submit(Task::new("a")),
            Err(QueueError::DuplicateTask(_))
        ));
    }

    #[test]
    fn test_priority_order() {
        let mut queue = TaskQueue::new();
        queue.submit(Task::new("low").with_priority(1)).unwrap();
        queue.submit(Task::new("high").with_priority(10)).unwrap();
        queue.submit(Task::new("mid").with_priority(5)).unwrap();

        let none = HashSet::new();
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "high");
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "mid");
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "low");
    }

    #[test]
    fn test_priority_ties_keep_submission_order() {
        let mut queue = TaskQueue::new();
        queue.submit(Task::new("first").with_priority(3)).unwrap();
        queue.submit(Task::new("second").with_priority(3)).unwrap();
        queue.submit(Task::new("third").with_priority(3)).unwrap();

        let none = HashSet::new();
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "first");
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "second");
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "third");
    }

    #[test]
    fn test_serialized_drains_by_priority() {
        let mut queue = TaskQueue::new();
        queue
            .submit(Task::new("s1").serialized().with_priority(1))
            .unwrap();
        queue
            .submit(Task::new("s2").serialized().with_priority(9))
            .unwrap();

        assert_eq!(queue.next_serialized().unwrap().id.as_str(), "s2");
        assert_eq!(queue.next_serialized().unwrap().id.as_str(), "s1");
        assert!(queue.next_serialized().is_none());
    }

    #[test]
    fn test_next_runnable_respects_dependencies() {
        let mut queue = TaskQueue::new();
        queue
            .submit(Task::new("b").with_priority(10).with_dependency("a"))
            .unwrap();
        queue.submit(Task::new("a").with_priority(1)).unwrap();

        // b has higher priority but is blocked on a
        let none = HashSet::new();
        assert_eq!(queue.next_runnable(&none).unwrap().id.as_str(), "a");
        assert!(queue.next_runnable(&none).is_none());

        // once a resolves, b becomes runnable
        assert_eq!(
            queue.next_runnable(&resolved(&["a"])).unwrap().id.as_str(),
            "b"
        );
    }

    #[test]
    fn test_blocked_task_stays_queued() {
        let mut queue = TaskQueue::new();
        queue.submit(Task::new("b").with_dependency("a")).unwrap();

        let none = HashSet::new();
        assert!(queue.next_runnable(&none).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_stuck_report_lists_missing_dependencies() {
        let mut queue = TaskQueue::new();
        queue
            .submit(Task::new("b").with_dependency("never-submitted"))
            .unwrap();
        queue.submit(Task::new("c").with_dependency("b")).unwrap();

        let stuck = queue.stuck_report(&HashSet::new());
        assert_eq!(stuck.len(), 2);
        let b = stuck.iter().find(|s| s.id.as_str() == "b").unwrap();
        assert_eq!(b.missing, vec![TaskId::new("never-submitted")]);
    }

    #[test]
    fn test_drain_returns_serialized_first() {
        let mut queue = TaskQueue::new();
        queue.submit(Task::new("p")).unwrap();
        queue.submit(Task::new("s").serialized()).unwrap();

        let drained = queue.drain();
        assert_eq!(drained[0].id.as_str(), "s");
        assert_eq!(drained[1].id.as_str(), "p");
        assert!(queue.is_empty());
    }
}
