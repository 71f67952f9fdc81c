//! Default configuration values

use super::types::GantryConfig;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "gantry.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".gantry.toml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_FILE, ALT_CONFIG_FILE]
}

/// Generate default configuration TOML
pub fn default_config_toml() -> String {
    let config = GantryConfig::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Gantry Configuration
# See https://github.com/example/gantry for documentation

[pool]
min_workers = 1
max_workers = 4
task_timeout_ms = 30000
allocation_wait_ms = 30000
strategy = "least-loaded"

[retry]
max_retries = 3
base_delay_ms = 100
max_delay_ms = 30000
backoff_multiplier = 2.0
jitter_factor = 0.1

[sandbox]
image = "alpine:3"
sandbox_timeout_ms = 60000
network_disabled = true
cleanup = "immediate"
isolation = "per-task"

[sandbox.retry]
max_retries = 2
base_delay_ms = 500

[scheduler]
shutdown_grace_ms = 5000
"#;
