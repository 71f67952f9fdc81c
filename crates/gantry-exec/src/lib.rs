//! Gantry Exec - Execution scheduler
//!
//! This crate runs large sets of independent test tasks under bounded
//! parallelism: a priority/dependency-aware task queue, an elastic worker
//! pool with per-task timeouts, and a retry tracker that classifies flaky
//! and permanently failing tasks.

pub mod pool;
pub mod queue;
pub mod reporter;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker;

pub use pool::WorkerPool;
pub use queue::{StuckTask, TaskQueue};
pub use reporter::{
    CollectingReporter, EventReporter, ReporterRegistry, SchedulerEvent, TracingReporter,
};
pub use retry::{BackoffPolicy, FlakyTestRecord, FlakyTestReport, RetryAttempt, RetryTracker};
pub use scheduler::{ExecutedOn, ExecutionResult, RunReport, Scheduler, ShutdownHandle};
pub use stats::{SchedulerStats, StatsRecorder};
pub use task::{FailureKind, Task, TaskExecutor, TaskOutcome, TaskPayload};
pub use worker::{AllocationStrategy, EstimateProbe, ResourceProbe, Worker, WorkerState};
