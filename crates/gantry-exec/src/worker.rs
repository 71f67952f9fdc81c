//! Worker slots and resource probing

use serde::{Deserialize, Serialize};

use gantry_core::TaskId;
pub use gantry_core::config::AllocationStrategy;
use gantry_core::WorkerId;

/// Lifecycle state of a worker slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Ready for assignment
    Idle,
    /// Executing a task
    Busy,
    /// Exceeded a resource ceiling; about to be restarted
    Failed,
    /// Removed by the starvation-prevention policy
    Terminated,
}

/// An in-process execution slot that runs one task at a time
#[derive(Debug, Clone)]
pub struct Worker {
    /// Slot identifier; stable across restarts
    pub id: WorkerId,
    /// Current lifecycle state
    pub state: WorkerState,
    /// Task currently assigned, if any
    pub current_task: Option<TaskId>,
    /// Tasks this slot has completed successfully
    pub completed_count: u64,
    /// Tasks this slot has seen fail
    pub failed_count: u64,
    /// Last sampled resource usage in bytes
    pub resource_usage_estimate: u64,
}

impl Worker {
    /// Create a fresh idle worker
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            current_task: None,
            completed_count: 0,
            failed_count: 0,
            resource_usage_estimate: 0,
        }
    }

    /// Assign a task; Idle -> Busy
    pub fn assign(&mut self, task: TaskId) {
        self.state = WorkerState::Busy;
        self.current_task = Some(task);
    }

    /// Record a finished task; Busy -> Idle regardless of outcome
    pub fn release(&mut self, success: bool) {
        if success {
            self.completed_count += 1;
        } else {
            self.failed_count += 1;
        }
        self.state = WorkerState::Idle;
        self.current_task = None;
    }

    /// Reset to a fresh slot with the same id.
    ///
    /// Used when a worker drifts over its memory ceiling: counters and the
    /// usage estimate start over.
    pub fn restart(&mut self) {
        self.state = WorkerState::Idle;
        self.current_task = None;
        self.completed_count = 0;
        self.failed_count = 0;
        self.resource_usage_estimate = 0;
    }
}

/// Samples resource usage for a worker slot.
///
/// The default [`EstimateProbe`] derives a figure from task throughput; a
/// real OS-level probe can be injected without touching the pool.
pub trait ResourceProbe: Send + Sync {
    /// Sample current usage for the given worker, in bytes
    fn sample(&self, worker: &Worker) -> u64;
}

/// Default probe: estimates usage from how much work the slot has done
#[derive(Debug, Clone)]
pub struct EstimateProbe {
    /// Baseline usage attributed to an idle slot
    pub base_bytes: u64,
    /// Estimated growth per finished task
    pub bytes_per_task: u64,
}

impl Default for EstimateProbe {
    fn default() -> Self {
        Self {
            base_bytes: 32 * 1024 * 1024,
            bytes_per_task: 4 * 1024 * 1024,
        }
    }
}

impl ResourceProbe for EstimateProbe {
    fn sample(&self, worker: &Worker) -> u64 {
        self.base_bytes + (worker.completed_count + worker.failed_count) * self.bytes_per_task
    }
}
