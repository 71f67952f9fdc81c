//! Error types for sandbox operations

use thiserror::Error;

/// Result type alias using SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors raised while provisioning or driving a sandbox
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Sandbox could not be created
    #[error("Failed to create sandbox: {0}")]
    CreateFailed(String),

    /// Sandbox was created but failed to start
    #[error("Failed to start sandbox {id}: {reason}")]
    StartFailed { id: String, reason: String },

    /// Sandbox did not reach a terminal state within the deadline
    #[error("Sandbox {id} timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// Sandbox hit a resource ceiling during provisioning
    #[error("Sandbox {id} exhausted resources: {reason}")]
    ResourceExhausted { id: String, reason: String },

    /// Sandbox network setup failed
    #[error("Network setup failed for sandbox {id}: {reason}")]
    NetworkSetup { id: String, reason: String },

    /// The container runtime command itself failed to run
    #[error("Runtime command failed: {command} - {reason}")]
    RuntimeCommand { command: String, reason: String },

    /// Sandbox removal failed
    #[error("Failed to remove sandbox {id}: {reason}")]
    RemoveFailed { id: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// Whether this is an infrastructure failure eligible for the engine's
    /// own retry policy. Test-logic failures never appear here; they are
    /// reported through the sandbox's exit code and output instead.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed(_)
                | Self::StartFailed { .. }
                | Self::Timeout { .. }
                | Self::ResourceExhausted { .. }
                | Self::NetworkSetup { .. }
                | Self::RuntimeCommand { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(SandboxError::CreateFailed("x".into()).is_infrastructure());
        assert!(SandboxError::Timeout {
            id: "s".into(),
            timeout_ms: 1000,
        }
        .is_infrastructure());
        assert!(!SandboxError::RemoveFailed {
            id: "s".into(),
            reason: "gone".into(),
        }
        .is_infrastructure());
    }
}
