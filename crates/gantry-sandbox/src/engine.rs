//! Sandbox execution engine
//!
//! Drives the full sandbox lifecycle (Creating -> Created -> Starting ->
//! Running -> Exited/Failed -> Removing -> Removed) and retries a fixed set
//! of infrastructure failures with its own backoff schedule. A test failing
//! inside a successfully-run sandbox is NOT retried here; it comes back as a
//! terminal [`SandboxRun`] for the caller (or the retry tracker wrapping it)
//! to handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gantry_core::config::{CleanupStrategy, InfraRetryConfig, IsolationMode, SandboxConfig};
use gantry_exec::task::{Task, TaskExecutor, TaskOutcome, TaskPayload};

use crate::error::{Result, SandboxError};
use crate::runtime::{ContainerRuntime, DockerCli, ResourceSnapshot};
use crate::sandbox::{Sandbox, SandboxSpec, SandboxStatus};

/// One structured per-test result extracted from sandbox output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxTestResult {
    /// Test name
    pub name: String,
    /// Whether the test passed
    pub passed: bool,
    /// Reported duration; `None` when unknown
    pub duration_ms: Option<u64>,
    /// Reported error, on failure
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    name: String,
    status: String,
    duration_ms: Option<u64>,
    error: Option<String>,
}

/// Outcome of one sandboxed execution
#[derive(Debug, Clone)]
pub struct SandboxRun {
    /// The sandbox that ran, with its final lifecycle state
    pub sandbox: Sandbox,
    /// Exit code of the sandboxed command
    pub exit_code: i64,
    /// Per-test results extracted from the output
    pub results: Vec<SandboxTestResult>,
    /// Best-effort resource usage snapshot
    pub resources: Option<ResourceSnapshot>,
    /// Raw collected output
    pub output: String,
}

impl SandboxRun {
    /// Whether the sandbox exited cleanly and every extracted test passed
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.results.iter().all(|r| r.passed)
    }
}

/// Counters for the engine's infrastructure-retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStatsSnapshot {
    /// Provisioning retries performed across the engine's lifetime
    pub total_retries: u64,
    /// Infrastructure failures observed (including non-retried ones)
    pub provisioning_failures: u64,
}

#[derive(Debug)]
struct InfraBackoff {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl InfraBackoff {
    fn new(config: &InfraRetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        Duration::from_millis((base * self.multiplier.powi(attempt as i32)).min(max) as u64)
    }
}

/// Executes tasks inside resource-limited sandboxes
pub struct IsolationEngine {
    config: SandboxConfig,
    runtime: Arc<dyn ContainerRuntime>,
    total_retries: AtomicU64,
    provisioning_failures: AtomicU64,
    pending_cleanup: Mutex<Vec<String>>,
    sandbox_seq: AtomicU64,
}

impl IsolationEngine {
    /// Create an engine over the given runtime
    pub fn new(config: SandboxConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            config,
            runtime,
            total_retries: AtomicU64::new(0),
            provisioning_failures: AtomicU64::new(0),
            pending_cleanup: Mutex::new(Vec::new()),
            sandbox_seq: AtomicU64::new(0),
        }
    }

    /// Create an engine backed by the docker CLI
    pub fn docker(config: SandboxConfig) -> Self {
        Self::new(config, Arc::new(DockerCli::new()))
    }

    /// Execute one task in its own sandbox (per-task isolation)
    pub async fn execute(&self, task: &Task) -> Result<SandboxRun> {
        let command = match &task.payload {
            TaskPayload::Shell(cmd) => vec!["sh".to_string(), "-c".to_string(), cmd.clone()],
            _ => self.config.command.clone(),
        };
        self.run_isolated(
            &sanitize_name(task.id.as_str()),
            command,
            vec![task.id.to_string()],
        )
        .await
    }

    /// Execute many tasks in one sandbox (batch mode).
    ///
    /// Trades fault containment for lower provisioning overhead; the
    /// fallback result set degrades to one synthetic pass per task when the
    /// output carries no structured results.
    pub async fn execute_batch(&self, tasks: &[Task]) -> Result<SandboxRun> {
        let fallback = tasks.iter().map(|t| t.id.to_string()).collect();
        self.run_isolated("batch", self.config.command.clone(), fallback)
            .await
    }

    /// Run a set of tasks under the configured isolation mode: one sandbox
    /// per task (the default), or all tasks in a single sandbox.
    pub async fn run_tasks(&self, tasks: &[Task]) -> Result<Vec<SandboxRun>> {
        match self.config.isolation {
            IsolationMode::PerTask => {
                let mut runs = Vec::with_capacity(tasks.len());
                for task in tasks {
                    runs.push(self.execute(task).await?);
                }
                Ok(runs)
            }
            IsolationMode::Batch => Ok(vec![self.execute_batch(tasks).await?]),
        }
    }

    async fn run_isolated(
        &self,
        name: &str,
        command: Vec<String>,
        fallback_names: Vec<String>,
    ) -> Result<SandboxRun> {
        let backoff = InfraBackoff::new(&self.config.retry);
        let mut attempt = 0u32;

        loop {
            match self
                .provision_and_run(name, &command, &fallback_names, attempt)
                .await
            {
                Ok(run) => return Ok(run),
                Err(e) if e.is_infrastructure() && attempt < self.config.retry.max_retries => {
                    self.provisioning_failures.fetch_add(1, Ordering::Relaxed);
                    self.total_retries.fetch_add(1, Ordering::Relaxed);
                    let delay = backoff.delay_for(attempt);
                    warn!(
                        sandbox = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "sandbox provisioning failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_infrastructure() {
                        self.provisioning_failures.fetch_add(1, Ordering::Relaxed);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn provision_and_run(
        &self,
        name: &str,
        command: &[String],
        fallback_names: &[String],
        retry_attempt: u32,
    ) -> Result<SandboxRun> {
        let seq = self.sandbox_seq.fetch_add(1, Ordering::Relaxed);
        let spec = SandboxSpec::new(format!("gantry-{name}-{seq}"), &self.config.image)
            .with_command(command.to_vec())
            .with_limits(self.config.limits)
            .with_network_disabled(self.config.network_disabled);

        let mut sandbox = Sandbox {
            id: String::new(),
            name: spec.name.clone(),
            status: SandboxStatus::Creating,
            resource_limits: spec.limits,
            retry_attempt,
        };

        debug!(sandbox = %sandbox.name, "creating sandbox");
        sandbox.id = self.runtime.create(&spec).await?;
        sandbox.status = SandboxStatus::Created;
        if self.config.cleanup != CleanupStrategy::Immediate {
            self.pending_cleanup.lock().unwrap().push(sandbox.id.clone());
        }

        sandbox.status = SandboxStatus::Starting;
        if let Err(e) = self.runtime.start(&sandbox.id).await {
            sandbox.status = SandboxStatus::Failed;
            self.teardown(&mut sandbox).await;
            return Err(e);
        }
        sandbox.status = SandboxStatus::Running;

        let exit_code = match self
            .runtime
            .wait(&sandbox.id, self.config.sandbox_timeout())
            .await
        {
            Ok(code) => code,
            Err(e) => {
                sandbox.status = SandboxStatus::Failed;
                self.teardown(&mut sandbox).await;
                return Err(e);
            }
        };
        sandbox.status = if exit_code == 0 {
            SandboxStatus::Exited
        } else {
            SandboxStatus::Failed
        };

        let output = match self.runtime.logs(&sandbox.id).await {
            Ok(output) => output,
            Err(e) => {
                warn!(sandbox = %sandbox.id, "could not collect sandbox output: {e}");
                String::new()
            }
        };
        let results = extract_results(&output, fallback_names);
        // metrics are best-effort; their absence is not an error
        let resources = self.runtime.stats(&sandbox.id).await;

        self.teardown(&mut sandbox).await;

        Ok(SandboxRun {
            sandbox,
            exit_code,
            results,
            resources,
            output,
        })
    }

    /// Apply the cleanup strategy to a finished sandbox
    async fn teardown(&self, sandbox: &mut Sandbox) {
        if self.config.cleanup != CleanupStrategy::Immediate {
            return;
        }
        sandbox.status = SandboxStatus::Removing;
        match self.runtime.remove(&sandbox.id).await {
            Ok(()) => sandbox.status = SandboxStatus::Removed,
            Err(e) => {
                // leave it for a later forced cleanup rather than lose track
                warn!(sandbox = %sandbox.id, "sandbox removal failed: {e}");
                self.pending_cleanup.lock().unwrap().push(sandbox.id.clone());
            }
        }
    }

    /// Remove every sandbox registered for deferred cleanup.
    ///
    /// Used at the end of a run under the batch strategy and by the exit
    /// handler under the on-exit strategy. Returns how many were removed.
    pub async fn cleanup_all(&self) -> usize {
        let pending: Vec<String> = self.pending_cleanup.lock().unwrap().drain(..).collect();
        let mut removed = 0;
        for id in pending {
            match self.runtime.remove(&id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(sandbox = %id, "cleanup failed: {e}"),
            }
        }
        if removed > 0 {
            info!(removed, "sandboxes cleaned up");
        }
        removed
    }

    /// Number of sandboxes awaiting deferred cleanup
    pub fn pending_cleanup(&self) -> usize {
        self.pending_cleanup.lock().unwrap().len()
    }

    /// Spawn a task that force-removes leftover sandboxes when the process
    /// receives an interrupt signal. Crash resilience for the on-exit
    /// cleanup strategy.
    pub fn install_exit_handler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let removed = engine.cleanup_all().await;
                info!(removed, "removed leftover sandboxes on exit signal");
            }
        })
    }

    /// Snapshot of the infrastructure-retry counters
    pub fn retry_stats(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            total_retries: self.total_retries.load(Ordering::Relaxed),
            provisioning_failures: self.provisioning_failures.load(Ordering::Relaxed),
        }
    }
}

/// Extract structured per-test results from sandbox output.
///
/// Recognizes JSON lines of the form
/// `{"name": "...", "status": "passed"|"failed", "duration_ms": 12}`.
/// When nothing parseable is found the run degrades to one synthetic
/// "passed, unknown duration" result per expected name, loudly.
fn extract_results(output: &str, fallback_names: &[String]) -> Vec<SandboxTestResult> {
    let mut results = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        if let Ok(wire) = serde_json::from_str::<WireResult>(line) {
            results.push(SandboxTestResult {
                name: wire.name,
                passed: wire.status == "passed",
                duration_ms: wire.duration_ms,
                error: wire.error,
            });
        }
    }
    if results.is_empty() {
        warn!("no structured results in sandbox output; synthesizing passed results");
        return fallback_names
            .iter()
            .map(|name| SandboxTestResult {
                name: name.clone(),
                passed: true,
                duration_ms: None,
                error: None,
            })
            .collect();
    }
    results
}

fn sanitize_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Adapter that runs tasks through the isolation engine as a
/// [`TaskExecutor`], so the scheduler's retry tracker can wrap sandboxed
/// execution transparently.
pub struct SandboxExecutor {
    engine: Arc<IsolationEngine>,
}

impl SandboxExecutor {
    /// Wrap an engine
    pub fn new(engine: Arc<IsolationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TaskExecutor for SandboxExecutor {
    async fn execute(&self, task: &Task) -> TaskOutcome {
        let started = Instant::now();
        match self.engine.execute(task).await {
            Ok(run) => {
                let duration = started.elapsed();
                if run.succeeded() {
                    TaskOutcome::passed(duration).with_sandbox_id(run.sandbox.id)
                } else {
                    let mut error = run
                        .results
                        .iter()
                        .filter(|r| !r.passed)
                        .map(|r| {
                            r.error
                                .clone()
                                .unwrap_or_else(|| format!("{} failed", r.name))
                        })
                        .collect::<Vec<_>>()
                        .join("; ");
                    if error.is_empty() {
                        error = format!("sandbox exited with code {}", run.exit_code);
                    }
                    TaskOutcome::failed(error, duration).with_sandbox_id(run.sandbox.id)
                }
            }
            Err(e) => TaskOutcome::failed(
                format!("sandbox execution failed: {e}"),
                started.elapsed(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct MockRuntime {
        create_failures_remaining: AtomicU32,
        create_calls: AtomicU32,
        exit_code: i64,
        logs: String,
        removed: Mutex<Vec<String>>,
    }

    impl MockRuntime {
        fn passing(logs: &str) -> Self {
            Self {
                logs: logs.to_string(),
                ..Default::default()
            }
        }

        fn flaky_provisioning(failures: u32, logs: &str) -> Self {
            Self {
                create_failures_remaining: AtomicU32::new(failures),
                logs: logs.to_string(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn create(&self, spec: &SandboxSpec) -> Result<String> {
            let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.create_failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.create_failures_remaining
                    .fetch_sub(1, Ordering::SeqCst);
                return Err(SandboxError::NetworkSetup {
                    id: spec.name.clone(),
                    reason: "veth pair allocation failed".to_string(),
                });
            }
            Ok(format!("ctr-{}-{call}", spec.name))
        }

        async fn start(&self, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn wait(&self, _id: &str, _timeout: Duration) -> Result<i64> {
            Ok(self.exit_code)
        }

        async fn logs(&self, _id: &str) -> Result<String> {
            Ok(self.logs.clone())
        }

        async fn stats(&self, _id: &str) -> Option<ResourceSnapshot> {
            Some(ResourceSnapshot {
                cpu_percent: 1.5,
                memory_bytes: 1024,
                peak_memory_bytes: 2048,
            })
        }

        async fn remove(&self, id: &str) -> Result<()> {
            self.removed.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn fast_config() -> SandboxConfig {
        let mut config = SandboxConfig::default();
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config
    }

    const PASSING_LOGS: &str = r#"{"name": "get-users", "status": "passed", "duration_ms": 12}"#;

    #[tokio::test]
    async fn test_lifecycle_with_immediate_cleanup() {
        let runtime = Arc::new(MockRuntime::passing(PASSING_LOGS));
        let engine = IsolationEngine::new(fast_config(), runtime.clone());

        let run = engine.execute(&Task::new("get-users")).await.unwrap();

        assert_eq!(run.sandbox.status, SandboxStatus::Removed);
        assert_eq!(run.exit_code, 0);
        assert!(run.succeeded());
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].name, "get-users");
        assert_eq!(run.results[0].duration_ms, Some(12));
        assert_eq!(runtime.removed.lock().unwrap().len(), 1);
        assert!(run.resources.is_some());
    }

    #[tokio::test]
    async fn test_provisioning_retries_then_succeeds() {
        let runtime = Arc::new(MockRuntime::flaky_provisioning(2, PASSING_LOGS));
        let mut config = fast_config();
        config.retry.max_retries = 2;
        let engine = IsolationEngine::new(config, runtime.clone());

        let run = engine.execute(&Task::new("get-users")).await.unwrap();

        assert!(run.succeeded());
        assert_eq!(run.sandbox.retry_attempt, 2);
        assert_eq!(engine.retry_stats().total_retries, 2);
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_provisioning_retries_exhausted() {
        let runtime = Arc::new(MockRuntime::flaky_provisioning(10, PASSING_LOGS));
        let mut config = fast_config();
        config.retry.max_retries = 1;
        let engine = IsolationEngine::new(config, runtime.clone());

        let err = engine.execute(&Task::new("doomed")).await.unwrap_err();

        assert!(err.is_infrastructure());
        assert_eq!(engine.retry_stats().total_retries, 1);
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logic_failure_inside_sandbox_not_retried() {
        let logs = r#"{"name": "get-users", "status": "failed", "error": "500 != 200"}"#;
        let runtime = Arc::new(MockRuntime {
            exit_code: 1,
            logs: logs.to_string(),
            ..Default::default()
        });
        let engine = IsolationEngine::new(fast_config(), runtime.clone());

        let run = engine.execute(&Task::new("get-users")).await.unwrap();

        // failure comes back as a terminal run, with zero provisioning retries
        assert!(!run.succeeded());
        assert_eq!(run.exit_code, 1);
        assert_eq!(run.sandbox.status, SandboxStatus::Removed);
        assert_eq!(engine.retry_stats().total_retries, 0);
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_output_degrades_to_synthetic_pass() {
        let runtime = Arc::new(MockRuntime::passing("plain text, nothing structured"));
        let engine = IsolationEngine::new(fast_config(), runtime);

        let run = engine.execute(&Task::new("opaque")).await.unwrap();

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].name, "opaque");
        assert!(run.results[0].passed);
        assert_eq!(run.results[0].duration_ms, None);
    }

    #[tokio::test]
    async fn test_batch_cleanup_strategy() {
        let runtime = Arc::new(MockRuntime::passing(PASSING_LOGS));
        let config = fast_config().with_cleanup(CleanupStrategy::Batch);
        let engine = IsolationEngine::new(config, runtime.clone());

        engine.execute(&Task::new("a")).await.unwrap();
        engine.execute(&Task::new("b")).await.unwrap();

        assert!(runtime.removed.lock().unwrap().is_empty());
        assert_eq!(engine.pending_cleanup(), 2);

        let removed = engine.cleanup_all().await;
        assert_eq!(removed, 2);
        assert_eq!(engine.pending_cleanup(), 0);
        assert_eq!(runtime.removed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_execution_one_sandbox_many_tasks() {
        let logs = concat!(
            r#"{"name": "a", "status": "passed", "duration_ms": 3}"#,
            "\n",
            r#"{"name": "b", "status": "failed", "error": "timeout"}"#,
        );
        let runtime = Arc::new(MockRuntime::passing(logs));
        let engine = IsolationEngine::new(fast_config(), runtime.clone());

        let run = engine
            .execute_batch(&[Task::new("a"), Task::new("b")])
            .await
            .unwrap();

        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.results.len(), 2);
        assert!(!run.succeeded());
    }

    #[tokio::test]
    async fn test_sandbox_executor_maps_outcomes() {
        let logs = r#"{"name": "t", "status": "failed", "error": "assertion failed"}"#;
        let runtime = Arc::new(MockRuntime {
            exit_code: 1,
            logs: logs.to_string(),
            ..Default::default()
        });
        let engine = Arc::new(IsolationEngine::new(fast_config(), runtime));
        let executor = SandboxExecutor::new(engine);

        let outcome = executor.execute(&Task::new("t")).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("assertion failed"));
        assert!(outcome.sandbox_id.is_some());
    }

    #[tokio::test]
    async fn test_shell_payload_becomes_command() {
        struct SpyRuntime {
            inner: MockRuntime,
            last_command: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl ContainerRuntime for SpyRuntime {
            async fn create(&self, spec: &SandboxSpec) -> Result<String> {
                *self.last_command.lock().unwrap() = spec.command.clone();
                self.inner.create(spec).await
            }
            async fn start(&self, id: &str) -> Result<()> {
                self.inner.start(id).await
            }
            async fn wait(&self, id: &str, timeout: Duration) -> Result<i64> {
                self.inner.wait(id, timeout).await
            }
            async fn logs(&self, id: &str) -> Result<String> {
                self.inner.logs(id).await
            }
            async fn stats(&self, id: &str) -> Option<ResourceSnapshot> {
                self.inner.stats(id).await
            }
            async fn remove(&self, id: &str) -> Result<()> {
                self.inner.remove(id).await
            }
        }

        let runtime = Arc::new(SpyRuntime {
            inner: MockRuntime::passing(PASSING_LOGS),
            last_command: Mutex::new(Vec::new()),
        });
        let engine = IsolationEngine::new(fast_config(), runtime.clone());

        let task = Task::new("curl-check")
            .with_payload(TaskPayload::Shell("curl -f localhost/health".to_string()));
        engine.execute(&task).await.unwrap();

        let command = runtime.last_command.lock().unwrap().clone();
        assert_eq!(command[..2], ["sh", "-c"]);
        assert_eq!(command[2], "curl -f localhost/health");
    }

    #[tokio::test]
    async fn test_run_tasks_respects_isolation_mode() {
        let runtime = Arc::new(MockRuntime::passing(PASSING_LOGS));
        let engine = IsolationEngine::new(fast_config(), runtime.clone());
        let tasks = [Task::new("a"), Task::new("b")];

        let runs = engine.run_tasks(&tasks).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 2);

        let runtime = Arc::new(MockRuntime::passing(PASSING_LOGS));
        let config = fast_config().with_isolation(IsolationMode::Batch);
        let engine = IsolationEngine::new(config, runtime.clone());

        let runs = engine.run_tasks(&tasks).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extract_results_mixed_lines() {
        let output = concat!(
            "starting harness\n",
            r#"{"name": "a", "status": "passed", "duration_ms": 1}"#,
            "\n",
            "noise { not json\n",
            r#"{"name": "b", "status": "failed", "error": "boom"}"#,
            "\n",
        );
        let results = extract_results(output, &["fallback".to_string()]);
        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(results[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_infra_backoff_grows_and_caps() {
        let backoff = InfraBackoff::new(&InfraRetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 250,
            backoff_multiplier: 2.0,
        });
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(250));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("GET /users/{id}"), "GET--users--id-");
        assert_eq!(sanitize_name("plain-name_1.2"), "plain-name_1.2");
    }
}
