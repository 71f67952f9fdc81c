//! Scheduler execution reporting

use std::sync::Arc;
use std::time::Duration;

use gantry_core::{TaskId, WorkerId};

/// Events emitted during a scheduler run
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A task attempt is starting on a worker
    TaskStarted {
        id: TaskId,
        worker: WorkerId,
        attempt: u32,
    },
    /// A failed attempt will be retried after a backoff delay
    TaskRetrying {
        id: TaskId,
        attempt: u32,
        delay: Duration,
    },
    /// A task reached a successful terminal result
    TaskCompleted {
        id: TaskId,
        duration: Duration,
        flaky: bool,
    },
    /// A task reached a failed terminal result
    TaskFailed {
        id: TaskId,
        duration: Duration,
        error: String,
    },
    /// The serialized drain phase is starting
    SerializedPhaseStarted {
        task_count: usize,
    },
    /// The parallel phase is starting
    ParallelPhaseStarted {
        task_count: usize,
    },
    /// A worker slot was created
    WorkerSpawned {
        id: WorkerId,
    },
    /// An idle worker slot was removed
    WorkerTerminated {
        id: WorkerId,
    },
    /// A worker slot exceeded its resource ceiling and was restarted
    WorkerRestarted {
        id: WorkerId,
    },
    /// The run finished
    RunCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        flaky: usize,
        duration: Duration,
    },
}

/// Trait for reporting scheduler progress
pub trait EventReporter: Send + Sync {
    /// Handle a scheduler event
    fn report(&self, event: &SchedulerEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl EventReporter for TracingReporter {
    fn report(&self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::TaskStarted { id, worker, attempt } => {
                if *attempt == 0 {
                    tracing::info!("Starting {} on {}", id, worker);
                } else {
                    tracing::info!("Starting {} on {} (attempt {})", id, worker, attempt);
                }
            }
            SchedulerEvent::TaskRetrying { id, attempt, delay } => {
                tracing::warn!(
                    "{} failed attempt {}, retrying in {}ms",
                    id,
                    attempt,
                    delay.as_millis()
                );
            }
            SchedulerEvent::TaskCompleted { id, duration, flaky } => {
                if *flaky {
                    tracing::info!("{} completed (flaky) in {:.1}s", id, duration.as_secs_f64());
                } else {
                    tracing::info!("{} completed in {:.1}s", id, duration.as_secs_f64());
                }
            }
            SchedulerEvent::TaskFailed { id, duration, error } => {
                tracing::error!("{} failed after {:.1}s: {}", id, duration.as_secs_f64(), error);
            }
            SchedulerEvent::SerializedPhaseStarted { task_count } => {
                tracing::info!("Draining {} serialized tasks", task_count);
            }
            SchedulerEvent::ParallelPhaseStarted { task_count } => {
                tracing::info!("Starting parallel phase ({} tasks)", task_count);
            }
            SchedulerEvent::WorkerSpawned { id } => {
                tracing::debug!("{} spawned", id);
            }
            SchedulerEvent::WorkerTerminated { id } => {
                tracing::debug!("{} terminated (idle)", id);
            }
            SchedulerEvent::WorkerRestarted { id } => {
                tracing::warn!("{} restarted (over resource ceiling)", id);
            }
            SchedulerEvent::RunCompleted {
                total,
                succeeded,
                failed,
                flaky,
                duration,
            } => {
                tracing::info!(
                    "Run complete: {}/{} succeeded, {} failed, {} flaky ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    flaky,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<SchedulerEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventReporter for CollectingReporter {
    fn report(&self, event: &SchedulerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Registry of event reporters
pub struct ReporterRegistry {
    reporters: Vec<Arc<dyn EventReporter>>,
}

impl ReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: EventReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    pub fn all(&self) -> &[Arc<dyn EventReporter>] {
        &self.reporters
    }
}

impl EventReporter for ReporterRegistry {
    /// Broadcast an event to all registered reporters
    fn report(&self, event: &SchedulerEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl Default for ReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        let id = TaskId::new("get-users");

        reporter.report(&SchedulerEvent::TaskStarted {
            id: id.clone(),
            worker: WorkerId::new(0),
            attempt: 0,
        });
        reporter.report(&SchedulerEvent::TaskCompleted {
            id,
            duration: Duration::from_secs(5),
            flaky: false,
        });

        let events = reporter.events();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_tracing_reporter_does_not_panic() {
        let reporter = TracingReporter;
        reporter.report(&SchedulerEvent::RunCompleted {
            total: 3,
            succeeded: 2,
            failed: 1,
            flaky: 0,
            duration: Duration::from_secs(1),
        });
    }

    #[test]
    fn test_registry_broadcast() {
        let collecting = Arc::new(CollectingReporter::default());
        let mut registry = ReporterRegistry::empty();
        registry.reporters.push(collecting.clone());

        registry.report(&SchedulerEvent::WorkerSpawned {
            id: WorkerId::new(1),
        });

        assert_eq!(collecting.events().len(), 1);
    }

    #[test]
    fn test_register() {
        let mut registry = ReporterRegistry::empty();
        assert!(registry.all().is_empty());

        registry.register(TracingReporter);
        assert_eq!(registry.all().len(), 1);
    }
}
