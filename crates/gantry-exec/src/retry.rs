//! Retry tracking and flakiness classification
//!
//! Wraps a single task's execution with bounded retries and exponential
//! backoff, then classifies the outcome: success, flaky success (failed then
//! passed), or permanent failure. The registries survive until `reset` so
//! reports can be derived after a run.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gantry_core::config::RetryConfig;
use gantry_core::TaskId;

use crate::reporter::{EventReporter, SchedulerEvent};
use crate::task::{FailureKind, Task, TaskOutcome};

/// Exponential backoff schedule with a hard ceiling and optional jitter
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl BackoffPolicy {
    /// Build a policy from the retry configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
            jitter_factor: config.jitter_factor,
        }
    }

    /// Delay before retrying after the given (0-based) failed attempt.
    ///
    /// Grows exponentially, capped at the ceiling; jitter spreads retries out
    /// so many failing tasks do not retry in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let capped = (base * self.multiplier.powi(attempt as i32)).min(max);
        let jitter = capped * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        Duration::from_millis((capped + jitter).clamp(0.0, max) as u64)
    }
}

/// One failed execution attempt that will be retried
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 0-based attempt index
    pub attempt_number: u32,
    /// When the attempt failed
    pub timestamp: DateTime<Utc>,
    /// The reported error
    pub error: Option<String>,
    /// Backoff delay slept before the next attempt
    pub delay_before_next: Duration,
}

/// A task that failed at least once and subsequently succeeded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakyTestRecord {
    /// The flaky task
    pub task_id: TaskId,
    /// How many attempts failed before the success
    pub failure_count: u32,
    /// The failed attempts, in order
    pub attempts: Vec<RetryAttempt>,
    /// When the first failure was observed
    pub first_failure_at: DateTime<Utc>,
    /// When the final success was observed
    pub final_success_at: DateTime<Utc>,
    /// Cumulative wall time across all attempts
    pub total_wall_time: Duration,
}

/// The most-retried task in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostRetried {
    pub task_id: TaskId,
    pub retries: u32,
}

/// Aggregate flakiness report for downstream rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakyTestReport {
    /// Number of flaky tasks
    pub total_flaky: usize,
    /// Flaky tasks as a percentage of all tracked tasks
    pub flaky_percentage: f64,
    /// Mean retry count among flaky tasks
    pub average_retries: f64,
    /// The single task that needed the most retries, if any were retried
    pub most_retried: Option<MostRetried>,
    /// Total tasks run through the tracker
    pub total_tracked: u64,
}

/// Result of running a task through the retry tracker
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// The terminal attempt's outcome
    pub outcome: TaskOutcome,
    /// Which attempt produced the terminal result (0-based)
    pub attempts_used: u32,
    /// Whether the task failed at least once before succeeding
    pub is_flaky: bool,
}

#[derive(Debug, Default)]
struct Registry {
    attempts: HashMap<TaskId, Vec<RetryAttempt>>,
    flaky: HashMap<TaskId, FlakyTestRecord>,
    permanent: HashSet<TaskId>,
    tracked: u64,
}

/// Bounded-retry wrapper with a flaky-test registry
pub struct RetryTracker {
    global_max_retries: u32,
    backoff: BackoffPolicy,
    reporter: Arc<dyn EventReporter>,
    registry: Mutex<Registry>,
}

impl RetryTracker {
    /// Create a tracker from the retry configuration
    pub fn new(config: &RetryConfig, reporter: Arc<dyn EventReporter>) -> Self {
        Self {
            global_max_retries: config.max_retries,
            backoff: BackoffPolicy::new(config),
            reporter,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Execute a task with bounded retries and exponential backoff.
    ///
    /// `execute` runs one attempt and is handed the 0-based attempt index.
    /// The effective budget is `min(task.max_retries, global_max_retries)`
    /// extra attempts after the first. Shutdown-induced failures are terminal
    /// immediately and never retried.
    pub async fn run_with_retry<F, Fut>(&self, task: &Task, mut execute: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = TaskOutcome>,
    {
        let budget = task.max_retries.min(self.global_max_retries);
        self.registry.lock().unwrap().tracked += 1;

        let mut failures: Vec<RetryAttempt> = Vec::new();
        let mut first_failure_at: Option<DateTime<Utc>> = None;
        let mut total_wall = Duration::ZERO;
        let mut attempt = 0u32;

        loop {
            let outcome = execute(attempt).await;
            total_wall += outcome.duration;

            if outcome.success {
                let is_flaky = attempt > 0;
                if is_flaky {
                    let now = Utc::now();
                    let record = FlakyTestRecord {
                        task_id: task.id.clone(),
                        failure_count: attempt,
                        attempts: failures.clone(),
                        first_failure_at: first_failure_at.unwrap_or(now),
                        final_success_at: now,
                        total_wall_time: total_wall,
                    };
                    debug!(task = %task.id, failures = attempt, "flaky task recovered");
                    let mut registry = self.registry.lock().unwrap();
                    registry.flaky.insert(task.id.clone(), record);
                    registry.attempts.insert(task.id.clone(), failures);
                }
                return RetryOutcome {
                    outcome,
                    attempts_used: attempt,
                    is_flaky,
                };
            }

            if first_failure_at.is_none() {
                first_failure_at = Some(Utc::now());
            }

            let terminal =
                attempt >= budget || outcome.failure == Some(FailureKind::Shutdown);
            if terminal {
                let mut registry = self.registry.lock().unwrap();
                if outcome.failure != Some(FailureKind::Shutdown) {
                    warn!(task = %task.id, attempts = attempt + 1, "task permanently failed");
                    registry.permanent.insert(task.id.clone());
                }
                registry.attempts.insert(task.id.clone(), failures);
                return RetryOutcome {
                    outcome,
                    attempts_used: attempt,
                    is_flaky: false,
                };
            }

            let delay = self.backoff.delay_for(attempt);
            failures.push(RetryAttempt {
                attempt_number: attempt,
                timestamp: Utc::now(),
                error: outcome.error.clone(),
                delay_before_next: delay,
            });
            self.reporter.report(&SchedulerEvent::TaskRetrying {
                id: task.id.clone(),
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Whether the task exhausted its retry budget without succeeding
    pub fn is_permanent_failure(&self, id: &TaskId) -> bool {
        self.registry.lock().unwrap().permanent.contains(id)
    }

    /// Whether the task failed at least once and then succeeded
    pub fn is_flaky(&self, id: &TaskId) -> bool {
        self.registry.lock().unwrap().flaky.contains_key(id)
    }

    /// The flaky record for a task, if it recovered after failures
    pub fn flaky_record(&self, id: &TaskId) -> Option<FlakyTestRecord> {
        self.registry.lock().unwrap().flaky.get(id).cloned()
    }

    /// All retried attempts recorded for a task
    pub fn attempts_for(&self, id: &TaskId) -> Vec<RetryAttempt> {
        self.registry
            .lock()
            .unwrap()
            .attempts
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of every permanently failed task
    pub fn permanent_failures(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .registry
            .lock()
            .unwrap()
            .permanent
            .iter()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Derive the aggregate flakiness report. Read-only and idempotent.
    pub fn flaky_test_report(&self) -> FlakyTestReport {
        let registry = self.registry.lock().unwrap();
        let total_flaky = registry.flaky.len();
        let flaky_percentage = if registry.tracked == 0 {
            0.0
        } else {
            total_flaky as f64 * 100.0 / registry.tracked as f64
        };
        let average_retries = if total_flaky == 0 {
            0.0
        } else {
            registry
                .flaky
                .values()
                .map(|r| r.failure_count as f64)
                .sum::<f64>()
                / total_flaky as f64
        };
        let most_retried = registry
            .attempts
            .iter()
            .max_by_key(|(_, attempts)| attempts.len())
            .filter(|(_, attempts)| !attempts.is_empty())
            .map(|(id, attempts)| MostRetried {
                task_id: id.clone(),
                retries: attempts.len() as u32,
            });

        FlakyTestReport {
            total_flaky,
            flaky_percentage,
            average_retries,
            most_retried,
            total_tracked: registry.tracked,
        }
    }

    /// Clear every registry
    pub fn reset(&self) {
        *self.registry.lock().unwrap() = Registry::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    fn tracker(config: RetryConfig) -> RetryTracker {
        RetryTracker::new(&config, Arc::new(CollectingReporter::default()))
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = BackoffPolicy::new(&RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        });
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(9), Duration::from_millis(350));
    }

    #[test]
    fn test_backoff_jitter_stays_in_bounds() {
        let policy = BackoffPolicy::new(&RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
        });
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds_is_flaky() {
        let tracker = tracker(fast_config());
        let task = Task::new("wobbly").with_max_retries(3);
        let calls = AtomicU32::new(0);

        let result = tracker
            .run_with_retry(&task, |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        TaskOutcome::failed("boom", Duration::from_millis(1))
                    } else {
                        TaskOutcome::passed(Duration::from_millis(1))
                    }
                }
            })
            .await;

        assert!(result.outcome.success);
        assert!(result.is_flaky);
        assert_eq!(result.attempts_used, 2);

        let record = tracker.flaky_record(&task.id).unwrap();
        assert_eq!(record.failure_count, 2);
        assert_eq!(record.attempts.len(), 2);
        assert!(tracker.is_flaky(&task.id));
        assert!(!tracker.is_permanent_failure(&task.id));
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_permanent_failure() {
        let tracker = tracker(fast_config());
        let task = Task::new("hopeless").with_max_retries(1);

        let result = tracker
            .run_with_retry(&task, |_| async {
                TaskOutcome::failed("always", Duration::from_millis(1))
            })
            .await;

        assert!(!result.outcome.success);
        assert!(!result.is_flaky);
        assert_eq!(result.attempts_used, 1);
        assert!(tracker.is_permanent_failure(&task.id));
        assert_eq!(tracker.permanent_failures(), vec![task.id.clone()]);
        // only the non-terminal failure is recorded as a retry
        assert_eq!(tracker.attempts_for(&task.id).len(), 1);
    }

    #[tokio::test]
    async fn test_global_ceiling_caps_task_budget() {
        let config = RetryConfig {
            max_retries: 1,
            ..fast_config()
        };
        let tracker = tracker(config);
        let task = Task::new("capped").with_max_retries(10);
        let calls = AtomicU32::new(0);

        tracker
            .run_with_retry(&task, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { TaskOutcome::failed("no", Duration::from_millis(1)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_failure_not_retried() {
        let tracker = tracker(fast_config());
        let task = Task::new("late").with_max_retries(5);
        let calls = AtomicU32::new(0);

        let result = tracker
            .run_with_retry(&task, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { TaskOutcome::aborted_by_shutdown() }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.outcome.failure, Some(FailureKind::Shutdown));
        // shutdown is not a retry-budget exhaustion
        assert!(!tracker.is_permanent_failure(&task.id));
    }

    #[tokio::test]
    async fn test_flaky_report_math() {
        let tracker = tracker(fast_config());

        // one clean pass
        tracker
            .run_with_retry(&Task::new("clean"), |_| async {
                TaskOutcome::passed(Duration::from_millis(1))
            })
            .await;

        // one flaky (1 failure)
        let calls = AtomicU32::new(0);
        tracker
            .run_with_retry(&Task::new("flaky-1").with_max_retries(3), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        TaskOutcome::failed("x", Duration::from_millis(1))
                    } else {
                        TaskOutcome::passed(Duration::from_millis(1))
                    }
                }
            })
            .await;

        // one flaky (3 failures)
        let calls = AtomicU32::new(0);
        tracker
            .run_with_retry(&Task::new("flaky-3").with_max_retries(3), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        TaskOutcome::failed("x", Duration::from_millis(1))
                    } else {
                        TaskOutcome::passed(Duration::from_millis(1))
                    }
                }
            })
            .await;

        // one permanent failure
        tracker
            .run_with_retry(&Task::new("dead").with_max_retries(0), |_| async {
                TaskOutcome::failed("x", Duration::from_millis(1))
            })
            .await;

        let report = tracker.flaky_test_report();
        assert_eq!(report.total_tracked, 4);
        assert_eq!(report.total_flaky, 2);
        assert_eq!(report.flaky_percentage, 50.0);
        assert_eq!(report.average_retries, 2.0);
        assert_eq!(
            report.most_retried,
            Some(MostRetried {
                task_id: TaskId::new("flaky-3"),
                retries: 3,
            })
        );
    }

    #[tokio::test]
    async fn test_report_idempotent() {
        let tracker = tracker(fast_config());
        tracker
            .run_with_retry(&Task::new("t"), |_| async {
                TaskOutcome::passed(Duration::from_millis(1))
            })
            .await;

        assert_eq!(tracker.flaky_test_report(), tracker.flaky_test_report());
    }

    #[test]
    fn test_empty_report_has_no_nan() {
        let tracker = tracker(fast_config());
        let report = tracker.flaky_test_report();
        assert_eq!(report.flaky_percentage, 0.0);
        assert_eq!(report.average_retries, 0.0);
        assert!(report.most_retried.is_none());
    }
}
