//! Scheduler orchestration
//!
//! Composes the task queue, worker pool, and retry tracker into one run:
//! serialized tasks drain first, one at a time, then the parallel phase
//! admits runnable tasks as workers free up. Every submitted task ends with
//! exactly one terminal result, except tasks whose dependencies can never
//! resolve, which are reported in a distinct diagnostic list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use gantry_core::config::GantryConfig;
use gantry_core::{validate_config, Result, TaskId, WorkerId};

use crate::pool::WorkerPool;
use crate::queue::{StuckTask, TaskQueue};
use crate::reporter::{EventReporter, SchedulerEvent, TracingReporter};
use crate::retry::{FlakyTestReport, RetryTracker};
use crate::stats::{SchedulerStats, StatsRecorder};
use crate::task::{FailureKind, Task, TaskExecutor};
use crate::worker::{EstimateProbe, ResourceProbe};

/// Where a task's terminal attempt executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutedOn {
    /// An in-process worker slot
    Worker(WorkerId),
    /// An isolated sandbox
    Sandbox(String),
}

/// Terminal outcome of one task; produced exactly once per task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The task this result belongs to
    pub task_id: TaskId,
    /// Whether the task ultimately succeeded
    pub success: bool,
    /// Error from the terminal attempt, on failure
    pub error: Option<String>,
    /// Wall time of the terminal attempt
    pub execution_time: Duration,
    /// Which attempt produced this result (0-based)
    pub retry_attempt: u32,
    /// Whether the task failed at least once before succeeding
    pub is_flaky: bool,
    /// Failure classification; `None` on success
    pub failure: Option<FailureKind>,
    /// Where the terminal attempt ran; `None` if the task never started
    pub executed_on: Option<ExecutedOn>,
}

/// Everything a run hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// One terminal result per executed task
    pub results: Vec<ExecutionResult>,
    /// Aggregate scheduler statistics
    pub stats: SchedulerStats,
    /// Flakiness report derived from the retry registry
    pub flaky_report: FlakyTestReport,
    /// Tasks that could never be scheduled, with their unresolved dependencies
    pub unschedulable: Vec<StuckTask>,
}

impl RunReport {
    /// One-line human-readable summary, mainly for logs and debugging
    pub fn summary(&self) -> String {
        let succeeded = self.results.iter().filter(|r| r.success).count();
        let failed = self.results.len() - succeeded;
        let flaky = self.results.iter().filter(|r| r.is_flaky).count();
        format!(
            "{} tasks: {} passed, {} failed, {} flaky, {} unschedulable",
            self.results.len(),
            succeeded,
            failed,
            flaky,
            self.unschedulable.len()
        )
    }
}

/// Handle for requesting a cooperative shutdown of a running scheduler
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop admitting tasks; in-flight tasks get the configured grace period
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The execution scheduler
pub struct Scheduler {
    config: GantryConfig,
    pool: Arc<WorkerPool>,
    retry: Arc<RetryTracker>,
    reporter: Arc<dyn EventReporter>,
    stats: Arc<StatsRecorder>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Scheduler {
    /// Create a scheduler with the default resource probe and tracing reporter
    pub fn new(config: GantryConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(EstimateProbe::default()),
            Arc::new(TracingReporter),
        )
    }

    /// Create a scheduler with an injected probe and reporter
    pub fn with_parts(
        config: GantryConfig,
        probe: Arc<dyn ResourceProbe>,
        reporter: Arc<dyn EventReporter>,
    ) -> Result<Self> {
        validate_config(&config)?;
        let stats = Arc::new(StatsRecorder::new());
        let pool = Arc::new(WorkerPool::new(
            config.pool.clone(),
            probe,
            reporter.clone(),
            stats.clone(),
        )?);
        let retry = Arc::new(RetryTracker::new(&config.retry, reporter.clone()));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            pool,
            retry,
            reporter,
            stats,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Handle for requesting shutdown from another task or thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> SchedulerStats {
        self.stats.snapshot()
    }

    /// Current flakiness report
    pub fn flaky_report(&self) -> FlakyTestReport {
        self.retry.flaky_test_report()
    }

    /// The retry tracker, for registry lookups after a run
    pub fn retry_tracker(&self) -> &RetryTracker {
        &self.retry
    }

    /// Run every submitted task to a terminal result.
    ///
    /// Serialized tasks drain strictly first, each alone; the parallel phase
    /// then admits tasks as their dependencies resolve (a dependency is
    /// satisfied by a completed *or* permanently failed result) and workers
    /// become available.
    #[instrument(skip_all, fields(tasks = tasks.len()))]
    pub async fn run(
        &self,
        tasks: Vec<Task>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<RunReport> {
        let run_start = Instant::now();
        let mut queue = TaskQueue::new();
        for task in tasks {
            queue.submit(task)?;
        }

        let mut results: Vec<ExecutionResult> = Vec::with_capacity(queue.len());
        let mut resolved: HashSet<TaskId> = HashSet::new();
        let mut shutdown_rx = self.shutdown.subscribe();

        // Serialized drain: one at a time, each to a terminal result, before
        // any parallel task begins.
        if queue.has_serialized() {
            self.reporter.report(&SchedulerEvent::SerializedPhaseStarted {
                task_count: queue.serialized_len(),
            });
            while let Some(task) = queue.next_serialized() {
                if *shutdown_rx.borrow() {
                    resolved.insert(task.id.clone());
                    results.push(shutdown_result(task.id));
                    self.stats.record_result(false, Duration::ZERO);
                    continue;
                }
                let worker = self.pool.allocate(&task.id).await?;
                let result = run_assigned(
                    self.pool.clone(),
                    self.retry.clone(),
                    self.reporter.clone(),
                    self.stats.clone(),
                    task,
                    worker,
                    executor.clone(),
                )
                .await;
                resolved.insert(result.task_id.clone());
                results.push(result);
            }
        }

        // Parallel phase: admit runnable tasks, collect completions, re-poll
        // the queue on every completion.
        self.reporter.report(&SchedulerEvent::ParallelPhaseStarted {
            task_count: queue.parallel_len(),
        });
        let mut running: JoinSet<ExecutionResult> = JoinSet::new();
        let mut in_flight: HashSet<TaskId> = HashSet::new();
        let mut unschedulable: Vec<StuckTask> = Vec::new();

        loop {
            if !*shutdown_rx.borrow() {
                while let Some(task) = queue.next_runnable(&resolved) {
                    let worker = self.pool.allocate(&task.id).await?;
                    in_flight.insert(task.id.clone());
                    running.spawn(run_assigned(
                        self.pool.clone(),
                        self.retry.clone(),
                        self.reporter.clone(),
                        self.stats.clone(),
                        task,
                        worker,
                        executor.clone(),
                    ));
                }
            }

            if running.is_empty() {
                if !*shutdown_rx.borrow() && queue.has_parallel() {
                    unschedulable = queue.stuck_report(&resolved);
                    warn!(
                        stuck = unschedulable.len(),
                        "tasks cannot be scheduled; dependencies never resolve"
                    );
                }
                break;
            }

            tokio::select! {
                joined = running.join_next() => {
                    match joined {
                        Some(Ok(result)) => {
                            in_flight.remove(&result.task_id);
                            resolved.insert(result.task_id.clone());
                            results.push(result);
                        }
                        Some(Err(e)) => warn!("task driver panicked: {e}"),
                        None => {}
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("shutdown requested; draining in-flight tasks");
                }
            }

            if *shutdown_rx.borrow() && !running.is_empty() {
                let deadline = Instant::now() + self.config.scheduler.shutdown_grace();
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    match tokio::time::timeout(remaining, running.join_next()).await {
                        Ok(Some(Ok(result))) => {
                            in_flight.remove(&result.task_id);
                            resolved.insert(result.task_id.clone());
                            results.push(result);
                        }
                        Ok(Some(Err(e))) => warn!("task driver panicked: {e}"),
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
                break;
            }
        }

        if *shutdown_rx.borrow() {
            // Force-terminate whatever the grace period did not drain and tag
            // every unfinished task; nothing is silently dropped.
            running.abort_all();
            for task in queue.drain() {
                results.push(shutdown_result(task.id));
                self.stats.record_result(false, Duration::ZERO);
            }
            for id in in_flight.drain() {
                if !resolved.contains(&id) {
                    results.push(shutdown_result(id));
                    self.stats.record_result(false, Duration::ZERO);
                }
            }
            self.pool.reset().await;
        } else {
            for id in in_flight.drain() {
                if !resolved.contains(&id) {
                    warn!(task = %id, "task driver lost; recording crash result");
                    let mut result = shutdown_result(id);
                    result.failure = Some(FailureKind::Crash);
                    result.error = Some("task driver panicked".to_string());
                    results.push(result);
                    self.stats.record_result(false, Duration::ZERO);
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let flaky = results.iter().filter(|r| r.is_flaky).count();
        self.reporter.report(&SchedulerEvent::RunCompleted {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            flaky,
            duration: run_start.elapsed(),
        });

        Ok(RunReport {
            results,
            stats: self.stats.snapshot(),
            flaky_report: self.retry.flaky_test_report(),
            unschedulable,
        })
    }
}

fn shutdown_result(task_id: TaskId) -> ExecutionResult {
    ExecutionResult {
        task_id,
        success: false,
        error: Some("aborted by scheduler shutdown".to_string()),
        execution_time: Duration::ZERO,
        retry_attempt: 0,
        is_flaky: false,
        failure: Some(FailureKind::Shutdown),
        executed_on: None,
    }
}

/// Drive one task on its assigned worker: retries, release, stats, events.
async fn run_assigned(
    pool: Arc<WorkerPool>,
    retry: Arc<RetryTracker>,
    reporter: Arc<dyn EventReporter>,
    stats: Arc<StatsRecorder>,
    task: Task,
    worker: WorkerId,
    executor: Arc<dyn TaskExecutor>,
) -> ExecutionResult {
    let retried = retry
        .run_with_retry(&task, |attempt| {
            reporter.report(&SchedulerEvent::TaskStarted {
                id: task.id.clone(),
                worker,
                attempt,
            });
            let pool = pool.clone();
            let executor = executor.clone();
            let task = task.clone();
            async move { pool.execute_attempt(&task, executor).await }
        })
        .await;

    let outcome = retried.outcome;
    if let Err(e) = pool.release(worker, outcome.success).await {
        warn!(worker = %worker, "release failed: {e}");
    }
    stats.record_result(outcome.success, outcome.duration);

    if outcome.success {
        reporter.report(&SchedulerEvent::TaskCompleted {
            id: task.id.clone(),
            duration: outcome.duration,
            flaky: retried.is_flaky,
        });
    } else {
        reporter.report(&SchedulerEvent::TaskFailed {
            id: task.id.clone(),
            duration: outcome.duration,
            error: outcome.error.clone().unwrap_or_default(),
        });
    }

    let executed_on = match &outcome.sandbox_id {
        Some(id) => Some(ExecutedOn::Sandbox(id.clone())),
        None => Some(ExecutedOn::Worker(worker)),
    };

    ExecutionResult {
        task_id: task.id,
        success: outcome.success,
        error: outcome.error,
        execution_time: outcome.duration,
        retry_attempt: retried.attempts_used,
        is_flaky: retried.is_flaky,
        failure: outcome.failure,
        executed_on,
    }
}
