//! Worker pool allocation
//!
//! An elastic pool of execution slots bounded by `[min_workers,
//! max_workers]`. Allocation picks an idle slot using the configured
//! strategy, grows the pool on demand, and otherwise blocks on a
//! condition-wait (a worker release publishes an availability event; there
//! is no polling loop). After every release a starvation-prevention pass
//! trims excess idle slots back toward `min_workers`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use gantry_core::config::{AllocationStrategy, PoolConfig, TASK_TIMEOUT_FLOOR_MS};
use gantry_core::{PoolError, TaskId, WorkerId};

use crate::reporter::{EventReporter, SchedulerEvent};
use crate::stats::StatsRecorder;
use crate::task::{Task, TaskExecutor, TaskOutcome};
use crate::worker::{ResourceProbe, Worker, WorkerState};

#[derive(Debug)]
struct PoolState {
    workers: Vec<Worker>,
    next_id: u64,
}

/// Dynamically sized set of execution slots
pub struct WorkerPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Notify,
    probe: Arc<dyn ResourceProbe>,
    reporter: Arc<dyn EventReporter>,
    stats: Arc<StatsRecorder>,
}

impl WorkerPool {
    /// Create a pool, validating the sizing and timeout up front.
    ///
    /// `min_workers` slots are spawned immediately so the pool size invariant
    /// `min <= size <= max` holds from construction onward.
    pub fn new(
        config: PoolConfig,
        probe: Arc<dyn ResourceProbe>,
        reporter: Arc<dyn EventReporter>,
        stats: Arc<StatsRecorder>,
    ) -> Result<Self, PoolError> {
        if config.min_workers < 1 || config.min_workers > config.max_workers {
            return Err(PoolError::InvalidPoolSize {
                min: config.min_workers,
                max: config.max_workers,
            });
        }
        if config.task_timeout_ms < TASK_TIMEOUT_FLOOR_MS {
            return Err(PoolError::TimeoutBelowFloor {
                configured_ms: config.task_timeout_ms,
                floor_ms: TASK_TIMEOUT_FLOOR_MS,
            });
        }

        let mut workers = Vec::with_capacity(config.min_workers);
        for n in 0..config.min_workers {
            let id = WorkerId::new(n as u64);
            workers.push(Worker::new(id));
            stats.worker_spawned();
            reporter.report(&SchedulerEvent::WorkerSpawned { id });
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                workers,
                next_id: config.min_workers as u64,
            }),
            available: Notify::new(),
            probe,
            reporter,
            stats,
            config,
        })
    }

    /// Assign an idle worker to a task, growing the pool up to `max_workers`.
    ///
    /// When the pool is saturated, waits for a release event up to the
    /// configured allocation bound, then fails with
    /// [`PoolError::NoWorkerAvailable`].
    pub async fn allocate(&self, task: &TaskId) -> Result<WorkerId, PoolError> {
        let started = Instant::now();
        let wait_bound = self.config.allocation_wait();

        loop {
            let notified = self.available.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(idx) = self.pick_idle(&state) {
                    let worker = &mut state.workers[idx];
                    worker.assign(task.clone());
                    self.stats.worker_assigned();
                    debug!(worker = %worker.id, task = %task, "worker assigned");
                    return Ok(worker.id);
                }
                if state.workers.len() < self.config.max_workers {
                    let id = WorkerId::new(state.next_id);
                    state.next_id += 1;
                    let mut worker = Worker::new(id);
                    worker.assign(task.clone());
                    state.workers.push(worker);
                    self.stats.worker_spawned();
                    self.stats.worker_assigned();
                    self.reporter.report(&SchedulerEvent::WorkerSpawned { id });
                    debug!(worker = %id, task = %task, "worker spawned for task");
                    return Ok(id);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= wait_bound {
                return Err(PoolError::NoWorkerAvailable {
                    waited_ms: wait_bound.as_millis() as u64,
                });
            }
            if tokio::time::timeout(wait_bound - elapsed, notified)
                .await
                .is_err()
            {
                return Err(PoolError::NoWorkerAvailable {
                    waited_ms: wait_bound.as_millis() as u64,
                });
            }
        }
    }

    fn pick_idle(&self, state: &PoolState) -> Option<usize> {
        let idle: Vec<usize> = state
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.state == WorkerState::Idle)
            .map(|(i, _)| i)
            .collect();
        if idle.is_empty() {
            return None;
        }
        match self.config.strategy {
            AllocationStrategy::LeastLoaded => idle
                .iter()
                .copied()
                .min_by_key(|&i| state.workers[i].resource_usage_estimate),
            AllocationStrategy::RoundRobin => Some(idle[0]),
            AllocationStrategy::Random => Some(idle[rand::random_range(0..idle.len())]),
            AllocationStrategy::Priority => idle
                .iter()
                .copied()
                .min_by_key(|&i| state.workers[i].completed_count),
        }
    }

    /// Execute one attempt under the per-task deadline.
    ///
    /// Exceeding the deadline is a timeout failure, distinct from a
    /// task-logic failure; a panicking executor is caught and reported as a
    /// harness crash. Both take the normal retry path.
    pub async fn execute_attempt(
        &self,
        task: &Task,
        executor: Arc<dyn TaskExecutor>,
    ) -> TaskOutcome {
        let started = Instant::now();
        let mut handle = {
            let task = task.clone();
            tokio::spawn(async move { executor.execute(&task).await })
        };
        match tokio::time::timeout(self.config.task_timeout(), &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                TaskOutcome::crashed(format!("executor crashed: {join_err}"), started.elapsed())
            }
            Err(_) => {
                handle.abort();
                TaskOutcome::timed_out(self.config.task_timeout())
            }
        }
    }

    /// Return a worker to Idle after its task reached a terminal result,
    /// publish the availability event, and run the starvation-prevention
    /// pass.
    pub async fn release(&self, id: WorkerId, success: bool) -> Result<(), PoolError> {
        {
            let mut state = self.state.lock().await;
            let worker = state
                .workers
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| PoolError::WorkerNotFound(id.to_string()))?;
            worker.release(success);
            worker.resource_usage_estimate = self.probe.sample(worker);
            self.stats.worker_released();
            self.shrink_idle(&mut state);
            let total: u64 = state
                .workers
                .iter()
                .map(|w| w.resource_usage_estimate)
                .sum();
            self.stats.set_resource_usage(total);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Terminate idle workers in excess of the idle-slack threshold (half the
    /// pool), never below `min_workers`.
    fn shrink_idle(&self, state: &mut PoolState) {
        loop {
            let len = state.workers.len();
            if len <= self.config.min_workers {
                break;
            }
            let idle = state
                .workers
                .iter()
                .filter(|w| w.state == WorkerState::Idle)
                .count();
            if idle <= len / 2 {
                break;
            }
            let Some(pos) = state
                .workers
                .iter()
                .rposition(|w| w.state == WorkerState::Idle)
            else {
                break;
            };
            let mut worker = state.workers.remove(pos);
            worker.state = WorkerState::Terminated;
            self.stats.worker_terminated();
            self.reporter
                .report(&SchedulerEvent::WorkerTerminated { id: worker.id });
            debug!(worker = %worker.id, "idle worker terminated");
        }
    }

    /// Inspect every idle worker's resource usage and restart any slot over
    /// the per-worker memory ceiling, bounding resource drift over long runs.
    pub async fn monitor_resources(&self) {
        let mut state = self.state.lock().await;
        for worker in state.workers.iter_mut() {
            if worker.state != WorkerState::Idle {
                continue;
            }
            let usage = self.probe.sample(worker);
            worker.resource_usage_estimate = usage;
            if usage > self.config.memory_limit_per_worker {
                warn!(
                    worker = %worker.id,
                    usage,
                    limit = self.config.memory_limit_per_worker,
                    "worker over memory ceiling, restarting"
                );
                worker.state = WorkerState::Failed;
                worker.restart();
                self.stats.worker_restarted();
                self.reporter
                    .report(&SchedulerEvent::WorkerRestarted { id: worker.id });
            }
        }
        let total: u64 = state
            .workers
            .iter()
            .map(|w| w.resource_usage_estimate)
            .sum();
        self.stats.set_resource_usage(total);
    }

    /// Discard every worker and respawn `min_workers` fresh slots.
    ///
    /// Used after a shutdown force-terminated in-flight work.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        for _ in 0..state.workers.len() {
            self.stats.worker_terminated();
        }
        state.workers.clear();
        for _ in 0..self.config.min_workers {
            let id = WorkerId::new(state.next_id);
            state.next_id += 1;
            state.workers.push(Worker::new(id));
            self.stats.worker_spawned();
        }
        self.available.notify_waiters();
    }

    /// Current pool size
    pub async fn size(&self) -> usize {
        self.state.lock().await.workers.len()
    }

    /// Snapshot of every worker slot
    pub async fn workers(&self) -> Vec<Worker> {
        self.state.lock().await.workers.clone()
    }
}
