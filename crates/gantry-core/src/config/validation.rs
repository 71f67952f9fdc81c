//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::GantryConfig;

/// Minimum accepted per-task timeout in milliseconds
pub const TASK_TIMEOUT_FLOOR_MS: u64 = 1_000;

/// Validate configuration
pub fn validate_config(config: &GantryConfig) -> Result<()> {
    debug!("validating configuration");
    validate_pool(config)?;
    validate_retry(config)?;
    validate_sandbox(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_pool(config: &GantryConfig) -> Result<()> {
    let pool = &config.pool;

    if pool.min_workers < 1 {
        return Err(ConfigError::InvalidValue {
            field: "pool.min_workers".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }

    if pool.min_workers > pool.max_workers {
        return Err(ConfigError::InvalidValue {
            field: "pool.max_workers".to_string(),
            message: format!(
                "must be >= min_workers ({} > {})",
                pool.min_workers, pool.max_workers
            ),
        }
        .into());
    }

    if pool.task_timeout_ms < TASK_TIMEOUT_FLOOR_MS {
        return Err(ConfigError::InvalidValue {
            field: "pool.task_timeout_ms".to_string(),
            message: format!("must be at least {TASK_TIMEOUT_FLOOR_MS}ms"),
        }
        .into());
    }

    if pool.allocation_wait_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "pool.allocation_wait_ms".to_string(),
            message: "must be greater than 0".to_string(),
        }
        .into());
    }

    if pool.memory_limit_per_worker == 0 {
        return Err(ConfigError::InvalidValue {
            field: "pool.memory_limit_per_worker".to_string(),
            message: "must be greater than 0".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_retry(config: &GantryConfig) -> Result<()> {
    let retry = &config.retry;

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::InvalidValue {
            field: "retry.backoff_multiplier".to_string(),
            message: "must be at least 1.0".to_string(),
        }
        .into());
    }

    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(ConfigError::InvalidValue {
            field: "retry.jitter_factor".to_string(),
            message: "must be between 0.0 and 1.0".to_string(),
        }
        .into());
    }

    if retry.base_delay_ms == 0 || retry.base_delay_ms > retry.max_delay_ms {
        return Err(ConfigError::InvalidValue {
            field: "retry.base_delay_ms".to_string(),
            message: "must be nonzero and <= max_delay_ms".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_sandbox(config: &GantryConfig) -> Result<()> {
    let sandbox = &config.sandbox;

    if sandbox.image.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "sandbox.image".to_string(),
            message: "image cannot be empty".to_string(),
        }
        .into());
    }

    if sandbox.limits.memory_bytes == 0 {
        return Err(ConfigError::InvalidValue {
            field: "sandbox.limits.memory_bytes".to_string(),
            message: "must be greater than 0".to_string(),
        }
        .into());
    }

    if sandbox.limits.cpus <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field: "sandbox.limits.cpus".to_string(),
            message: "must be greater than 0".to_string(),
        }
        .into());
    }

    if sandbox.limits.pids == 0 {
        return Err(ConfigError::InvalidValue {
            field: "sandbox.limits.pids".to_string(),
            message: "must be greater than 0".to_string(),
        }
        .into());
    }

    if sandbox.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::InvalidValue {
            field: "sandbox.retry.backoff_multiplier".to_string(),
            message: "must be at least 1.0".to_string(),
        }
        .into());
    }

    if sandbox.retry.base_delay_ms == 0 || sandbox.retry.base_delay_ms > sandbox.retry.max_delay_ms
    {
        return Err(ConfigError::InvalidValue {
            field: "sandbox.retry.base_delay_ms".to_string(),
            message: "must be nonzero and <= max_delay_ms".to_string(),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GantryConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_min_workers_rejected() {
        let config = GantryConfig::default()
            .with_pool(PoolConfig::default().with_min_workers(0));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_min_above_max_rejected() {
        let config = GantryConfig::default().with_pool(
            PoolConfig::default()
                .with_min_workers(8)
                .with_max_workers(2),
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_timeout_below_floor_rejected() {
        let config = GantryConfig::default()
            .with_pool(PoolConfig::default().with_task_timeout_ms(500));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_jitter_rejected() {
        let mut config = GantryConfig::default();
        config.retry.jitter_factor = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_sandbox_image_rejected() {
        let mut config = GantryConfig::default();
        config.sandbox.image = String::new();
        assert!(validate_config(&config).is_err());
    }
}
