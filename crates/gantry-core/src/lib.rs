//! Gantry Core - Core library for the Gantry test scheduler
//!
//! This crate provides the foundational types, error handling, and
//! configuration for the Gantry execution scheduler.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    validate_config, AllocationStrategy, CleanupStrategy, GantryConfig, InfraRetryConfig,
    IsolationMode, PoolConfig, RetryConfig, SandboxConfig, SchedulerConfig,
};
pub use error::{ConfigError, GantryError, PoolError, QueueError, Result};
pub use types::{ResourceLimits, TaskId, WorkerId};
