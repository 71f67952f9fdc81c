//! Scheduler statistics
//!
//! Counters are accumulated via atomic increments so concurrent task
//! completions never race a read-then-write; `snapshot` materializes the
//! serializable view handed to downstream reporting components.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Live counter block owned by the scheduler and pool
#[derive(Debug)]
pub struct StatsRecorder {
    started_at: Instant,
    total_workers: AtomicU64,
    active_workers: AtomicU64,
    failed_workers: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    execution_time_total_ms: AtomicU64,
    resource_usage_total: AtomicU64,
}

impl StatsRecorder {
    /// Create a recorder; uptime counts from here
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_workers: AtomicU64::new(0),
            active_workers: AtomicU64::new(0),
            failed_workers: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            execution_time_total_ms: AtomicU64::new(0),
            resource_usage_total: AtomicU64::new(0),
        }
    }

    /// A worker joined the pool
    pub fn worker_spawned(&self) {
        self.total_workers.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker was removed from the pool
    pub fn worker_terminated(&self) {
        self.total_workers.fetch_sub(1, Ordering::Relaxed);
    }

    /// A worker exceeded its resource ceiling and was restarted
    pub fn worker_restarted(&self) {
        self.failed_workers.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker went Busy
    pub fn worker_assigned(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker went back to Idle
    pub fn worker_released(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a terminal task result
    pub fn record_result(&self, success: bool, execution_time: Duration) {
        if success {
            self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.execution_time_total_ms
            .fetch_add(execution_time.as_millis() as u64, Ordering::Relaxed);
    }

    /// Replace the aggregate resource-usage gauge
    pub fn set_resource_usage(&self, total: u64) {
        self.resource_usage_total.store(total, Ordering::Relaxed);
    }

    /// Materialize a serializable snapshot
    pub fn snapshot(&self) -> SchedulerStats {
        let total = self.total_workers.load(Ordering::Relaxed);
        let active = self.active_workers.load(Ordering::Relaxed);
        let completed = self.tasks_completed.load(Ordering::Relaxed);
        let failed = self.tasks_failed.load(Ordering::Relaxed);
        let total_ms = self.execution_time_total_ms.load(Ordering::Relaxed);
        let finished = completed + failed;

        SchedulerStats {
            total_workers: total,
            active_workers: active,
            idle_workers: total.saturating_sub(active),
            failed_workers: self.failed_workers.load(Ordering::Relaxed),
            total_tasks_completed: completed,
            total_tasks_failed: failed,
            average_execution_time_ms: if finished == 0 {
                0.0
            } else {
                total_ms as f64 / finished as f64
            },
            total_resource_usage: self.resource_usage_total.load(Ordering::Relaxed),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics snapshot for downstream reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Current pool size
    pub total_workers: u64,
    /// Workers currently executing a task
    pub active_workers: u64,
    /// Workers ready for assignment
    pub idle_workers: u64,
    /// Workers restarted for exceeding a resource ceiling
    pub failed_workers: u64,
    /// Tasks with a successful terminal result
    pub total_tasks_completed: u64,
    /// Tasks with a failed terminal result
    pub total_tasks_failed: u64,
    /// Mean wall time across terminal results
    pub average_execution_time_ms: f64,
    /// Sum of sampled worker resource usage, in bytes
    pub total_resource_usage: u64,
    /// Time since the scheduler was constructed
    pub uptime_ms: u64,
}
