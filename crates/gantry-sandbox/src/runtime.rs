//! Container runtime seam
//!
//! The engine drives sandboxes through [`ContainerRuntime`]; the default
//! [`DockerCli`] implementation shells out to the docker binary. Tests plug
//! in an in-memory runtime instead.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SandboxError};
use crate::sandbox::SandboxSpec;

/// Best-effort resource usage snapshot for a sandbox
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// CPU usage percentage
    pub cpu_percent: f64,
    /// Current memory usage in bytes
    pub memory_bytes: u64,
    /// Peak memory usage in bytes
    pub peak_memory_bytes: u64,
}

/// Operations the isolation engine needs from a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Provision a sandbox; returns its runtime identifier
    async fn create(&self, spec: &SandboxSpec) -> Result<String>;

    /// Start a provisioned sandbox
    async fn start(&self, id: &str) -> Result<()>;

    /// Wait for the sandbox to reach a terminal run state; returns the exit
    /// code, or [`SandboxError::Timeout`] if the deadline elapses first
    async fn wait(&self, id: &str, timeout: Duration) -> Result<i64>;

    /// Collect the sandbox's combined output stream
    async fn logs(&self, id: &str) -> Result<String>;

    /// Sample resource usage; `None` when metrics are unavailable
    async fn stats(&self, id: &str) -> Option<ResourceSnapshot>;

    /// Remove the sandbox
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Runtime implementation shelling out to the docker CLI
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    /// Use the `docker` binary from PATH
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    /// Use a different binary (e.g. `podman`)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<std::process::Output> {
        debug!(binary = %self.binary, args = ?args, "running container runtime command");
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| SandboxError::RuntimeCommand {
                command: format!("{} {}", self.binary, args.join(" ")),
                reason: e.to_string(),
            })
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `docker create` argument list for a spec
fn create_args(spec: &SandboxSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        format!("--memory={}", spec.limits.memory_bytes),
        format!("--cpus={}", spec.limits.cpus),
        format!("--pids-limit={}", spec.limits.pids),
    ];
    if spec.network_disabled {
        args.push("--network=none".to_string());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Classify a create/start failure from the runtime's stderr
fn classify_provision_error(id: &str, stderr: &str) -> SandboxError {
    let lower = stderr.to_lowercase();
    if lower.contains("network") {
        SandboxError::NetworkSetup {
            id: id.to_string(),
            reason: stderr.trim().to_string(),
        }
    } else if lower.contains("memory") || lower.contains("resource") {
        SandboxError::ResourceExhausted {
            id: id.to_string(),
            reason: stderr.trim().to_string(),
        }
    } else {
        SandboxError::CreateFailed(stderr.trim().to_string())
    }
}

/// Parse a docker percentage like "1.25%"
fn parse_percent(s: &str) -> Option<f64> {
    s.trim().trim_end_matches('%').parse().ok()
}

/// Parse a docker size like "7.7MiB" into bytes
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let split = s.find(|c: char| c.is_ascii_alphabetic())?;
    let value: f64 = s[..split].parse().ok()?;
    let multiplier: f64 = match &s[split..] {
        "B" => 1.0,
        "KiB" | "kB" => 1024.0,
        "MiB" | "MB" => 1024.0 * 1024.0,
        "GiB" | "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn create(&self, spec: &SandboxSpec) -> Result<String> {
        let output = self.run(&create_args(spec)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_provision_error(&spec.name, &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn start(&self, id: &str) -> Result<()> {
        let output = self.run(&["start".to_string(), id.to_string()]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lower = stderr.to_lowercase();
            if lower.contains("network") {
                return Err(SandboxError::NetworkSetup {
                    id: id.to_string(),
                    reason: stderr.trim().to_string(),
                });
            }
            return Err(SandboxError::StartFailed {
                id: id.to_string(),
                reason: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn wait(&self, id: &str, timeout: Duration) -> Result<i64> {
        let args = ["wait".to_string(), id.to_string()];
        let wait = self.run(&args);
        let output = tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SandboxError::Timeout {
                id: id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse()
            .map_err(|_| SandboxError::RuntimeCommand {
                command: format!("{} wait {id}", self.binary),
                reason: format!("unparseable exit code: {}", stdout.trim()),
            })
    }

    async fn logs(&self, id: &str) -> Result<String> {
        let output = self.run(&["logs".to_string(), id.to_string()]).await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }

    async fn stats(&self, id: &str) -> Option<ResourceSnapshot> {
        let args = vec![
            "stats".to_string(),
            "--no-stream".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
            id.to_string(),
        ];
        let output = self.run(&args).await.ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let value: serde_json::Value = serde_json::from_str(stdout.trim()).ok()?;

        let cpu_percent = value
            .get("CPUPerc")
            .and_then(|v| v.as_str())
            .and_then(parse_percent)
            .unwrap_or(0.0);
        let memory_bytes = value
            .get("MemUsage")
            .and_then(|v| v.as_str())
            .and_then(|s| s.split('/').next())
            .and_then(parse_size)
            .unwrap_or(0);

        Some(ResourceSnapshot {
            cpu_percent,
            memory_bytes,
            peak_memory_bytes: memory_bytes,
        })
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let output = self
            .run(&["rm".to_string(), "-f".to_string(), id.to_string()])
            .await?;
        if !output.status.success() {
            return Err(SandboxError::RemoveFailed {
                id: id.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::ResourceLimits;

    #[test]
    fn test_create_args_include_limits() {
        let spec = SandboxSpec::new("gantry-t", "alpine:3").with_limits(ResourceLimits {
            memory_bytes: 1024,
            cpus: 0.5,
            pids: 64,
        });
        let args = create_args(&spec);

        assert!(args.contains(&"--memory=1024".to_string()));
        assert!(args.contains(&"--cpus=0.5".to_string()));
        assert!(args.contains(&"--pids-limit=64".to_string()));
        assert!(args.contains(&"--network=none".to_string()));
        assert_eq!(args.last().unwrap(), "alpine:3");
    }

    #[test]
    fn test_create_args_command_after_image() {
        let spec = SandboxSpec::new("gantry-t", "alpine:3")
            .with_command(vec!["sh".into(), "-c".into(), "true".into()])
            .with_network_disabled(false);
        let args = create_args(&spec);

        assert!(!args.contains(&"--network=none".to_string()));
        let image_pos = args.iter().position(|a| a == "alpine:3").unwrap();
        assert_eq!(&args[image_pos + 1..], ["sh", "-c", "true"]);
    }

    #[test]
    fn test_classify_provision_error() {
        assert!(matches!(
            classify_provision_error("s", "could not attach network endpoint"),
            SandboxError::NetworkSetup { .. }
        ));
        assert!(matches!(
            classify_provision_error("s", "cannot allocate memory"),
            SandboxError::ResourceExhausted { .. }
        ));
        assert!(matches!(
            classify_provision_error("s", "no such image"),
            SandboxError::CreateFailed(_)
        ));
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("1.25%"), Some(1.25));
        assert_eq!(parse_percent(" 0.00% "), Some(0.0));
        assert_eq!(parse_percent("n/a"), None);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512B"), Some(512));
        assert_eq!(parse_size("2KiB"), Some(2048));
        assert_eq!(parse_size("7.5MiB"), Some(7_864_320));
        assert_eq!(parse_size("junk"), None);
    }
}
