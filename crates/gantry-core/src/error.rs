//! Error types for Gantry

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using GantryError
pub type Result<T> = std::result::Result<T, GantryError>;

/// Main error type for Gantry operations
#[derive(Debug, Error)]
pub enum GantryError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Task queue errors
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Worker pool errors
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Task queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// A task with the same id was already submitted
    #[error("Task '{0}' was already submitted")]
    DuplicateTask(String),

    /// A task id was referenced but never submitted
    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

/// Worker pool errors
#[derive(Debug, Error)]
pub enum PoolError {
    /// Pool sizing does not satisfy 1 <= min <= max
    #[error("Invalid pool size: min_workers={min}, max_workers={max}")]
    InvalidPoolSize { min: usize, max: usize },

    /// Per-task timeout is below the enforced floor
    #[error("Task timeout {configured_ms}ms is below the {floor_ms}ms floor")]
    TimeoutBelowFloor { configured_ms: u64, floor_ms: u64 },

    /// No worker became available within the bounded wait
    #[error("No worker available after waiting {waited_ms}ms")]
    NoWorkerAvailable { waited_ms: u64 },

    /// A worker id was not found in the pool
    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    /// The pool is shutting down and no longer accepts work
    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

impl GantryError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
