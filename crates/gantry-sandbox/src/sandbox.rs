//! Sandbox lifecycle types

use serde::{Deserialize, Serialize};

use gantry_core::ResourceLimits;

/// Lifecycle state of a sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SandboxStatus {
    /// Provisioning in progress
    Creating,
    /// Provisioned but not started
    Created,
    /// Start requested
    Starting,
    /// Executing
    Running,
    /// Finished with exit code 0
    Exited,
    /// Nonzero exit, crash, or provisioning failure
    Failed,
    /// Teardown in progress
    Removing,
    /// Gone
    Removed,
}

impl SandboxStatus {
    /// Whether execution has finished (successfully or not)
    pub fn is_terminal_run_state(&self) -> bool {
        matches!(self, Self::Exited | Self::Failed)
    }
}

/// A provisioned, resource-bounded execution context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sandbox {
    /// Runtime-assigned identifier (empty until created)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Current lifecycle state
    pub status: SandboxStatus,
    /// Resource ceilings the sandbox was provisioned with
    pub resource_limits: ResourceLimits,
    /// Which provisioning attempt produced this sandbox (0-based)
    pub retry_attempt: u32,
}

/// Everything needed to provision one sandbox
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    /// Sandbox name handed to the runtime
    pub name: String,
    /// Container image
    pub image: String,
    /// Command to run (empty uses the image default)
    pub command: Vec<String>,
    /// Resource ceilings
    pub limits: ResourceLimits,
    /// Whether the sandbox runs without network access
    pub network_disabled: bool,
}

impl SandboxSpec {
    /// Create a spec with default limits and no network
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            limits: ResourceLimits::default(),
            network_disabled: true,
        }
    }

    /// Set the command
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Set the resource ceilings
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable network access
    pub fn with_network_disabled(mut self, disabled: bool) -> Self {
        self.network_disabled = disabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_run_states() {
        assert!(SandboxStatus::Exited.is_terminal_run_state());
        assert!(SandboxStatus::Failed.is_terminal_run_state());
        assert!(!SandboxStatus::Running.is_terminal_run_state());
        assert!(!SandboxStatus::Removed.is_terminal_run_state());
    }

    #[test]
    fn test_spec_builder() {
        let spec = SandboxSpec::new("gantry-t1", "alpine:3")
            .with_command(vec!["sh".into(), "-c".into(), "true".into()])
            .with_network_disabled(false);

        assert_eq!(spec.name, "gantry-t1");
        assert_eq!(spec.image, "alpine:3");
        assert_eq!(spec.command.len(), 3);
        assert!(!spec.network_disabled);
    }
}
