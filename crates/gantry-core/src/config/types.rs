//! Configuration types
//!
//! The configuration is constructed once at startup and never mutated in
//! place. The `with_*` methods return a new value, so concurrent readers can
//! share a config without locks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ResourceLimits;

/// Main configuration for the Gantry scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GantryConfig {
    /// Worker pool configuration
    pub pool: PoolConfig,

    /// Retry and flakiness tracking configuration
    pub retry: RetryConfig,

    /// Sandbox isolation configuration
    pub sandbox: SandboxConfig,

    /// Scheduler orchestration configuration
    pub scheduler: SchedulerConfig,
}

impl GantryConfig {
    /// Return a copy with the pool section replaced
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Return a copy with the retry section replaced
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Return a copy with the sandbox section replaced
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Return a copy with the scheduler section replaced
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}

/// Strategy for picking an idle worker during allocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStrategy {
    /// Idle worker with the smallest resource usage estimate
    #[default]
    LeastLoaded,
    /// First idle worker in pool order
    RoundRobin,
    /// Uniformly chosen idle worker
    Random,
    /// Idle worker with the fewest completed tasks
    Priority,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Minimum number of workers kept alive
    pub min_workers: usize,

    /// Maximum number of concurrent workers
    pub max_workers: usize,

    /// Memory ceiling per worker in bytes; an idle worker over this is restarted
    pub memory_limit_per_worker: u64,

    /// Per-task execution deadline in milliseconds
    pub task_timeout_ms: u64,

    /// Bounded wait for a free worker slot in milliseconds
    pub allocation_wait_ms: u64,

    /// Worker selection strategy
    pub strategy: AllocationStrategy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 4,
            memory_limit_per_worker: 512 * 1024 * 1024,
            task_timeout_ms: 30_000,
            allocation_wait_ms: 30_000,
            strategy: AllocationStrategy::default(),
        }
    }
}

impl PoolConfig {
    /// Per-task deadline as a [`Duration`]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Allocation wait bound as a [`Duration`]
    pub fn allocation_wait(&self) -> Duration {
        Duration::from_millis(self.allocation_wait_ms)
    }

    /// Return a copy with a different minimum pool size
    pub fn with_min_workers(mut self, min: usize) -> Self {
        self.min_workers = min;
        self
    }

    /// Return a copy with a different maximum pool size
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max;
        self
    }

    /// Return a copy with a different per-task timeout
    pub fn with_task_timeout_ms(mut self, ms: u64) -> Self {
        self.task_timeout_ms = ms;
        self
    }

    /// Return a copy with a different allocation strategy
    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Retry and backoff configuration for task-logic failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Global ceiling on retries; the effective budget per task is
    /// `min(task.max_retries, max_retries)`
    pub max_retries: u32,

    /// Base retry delay in milliseconds
    pub base_delay_ms: u64,

    /// Hard ceiling on the retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Exponential growth factor applied per attempt
    pub backoff_multiplier: f64,

    /// Random jitter range (0.0-1.0) applied to each delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Return a copy with a different global retry ceiling
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Return a copy with a different base delay
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Return a copy with jitter disabled
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

/// How sandboxes are torn down after use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStrategy {
    /// Remove right after collecting output
    #[default]
    Immediate,
    /// Remove all sandboxes from a run together at the end
    Batch,
    /// Rely on process-exit signal handling to force-remove leftovers
    OnExit,
}

/// How tasks map onto sandboxes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// One sandbox per task (stronger fault containment)
    #[default]
    PerTask,
    /// Many tasks in one sandbox
    Batch,
}

/// Backoff policy for sandbox infrastructure failures.
///
/// Kept separate from [`RetryConfig`]: infrastructure failures get a smaller
/// default budget and their own schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraRetryConfig {
    /// Maximum provisioning retries
    pub max_retries: u32,

    /// Base retry delay in milliseconds
    pub base_delay_ms: u64,

    /// Hard ceiling on the retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Exponential growth factor applied per attempt
    pub backoff_multiplier: f64,
}

impl Default for InfraRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Sandbox isolation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container image used for sandboxes
    pub image: String,

    /// Command run inside the sandbox (empty uses the image default)
    pub command: Vec<String>,

    /// Resource ceilings applied to each sandbox
    pub limits: ResourceLimits,

    /// Deadline for a sandbox to reach a terminal state, in milliseconds
    pub sandbox_timeout_ms: u64,

    /// Whether sandboxes run without network access
    pub network_disabled: bool,

    /// Teardown strategy
    pub cleanup: CleanupStrategy,

    /// Task-to-sandbox mapping
    pub isolation: IsolationMode,

    /// Retry policy for infrastructure failures
    pub retry: InfraRetryConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "alpine:3".to_string(),
            command: Vec::new(),
            limits: ResourceLimits::default(),
            sandbox_timeout_ms: 60_000,
            network_disabled: true,
            cleanup: CleanupStrategy::default(),
            isolation: IsolationMode::default(),
            retry: InfraRetryConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Sandbox deadline as a [`Duration`]
    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms)
    }

    /// Return a copy with a different image
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Return a copy with a different cleanup strategy
    pub fn with_cleanup(mut self, cleanup: CleanupStrategy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Return a copy with a different isolation mode
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }
}

/// Scheduler orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Grace period for in-flight tasks after a shutdown signal, in milliseconds
    pub shutdown_grace_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    /// Shutdown grace period as a [`Duration`]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
