//! Load config from the environment (after `.env`) or from a JSON file.

use crate::config::{validate, EngineConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

pub const ENV_BASE_PATH: &str = "RESOURCE_BASE_PATH";
pub const ENV_BIND_ADDR: &str = "RESOURCE_BIND_ADDR";
pub const ENV_MAX_BODY_BYTES: &str = "RESOURCE_MAX_BODY_BYTES";
pub const ENV_MEMOIZE_GETS: &str = "RESOURCE_MEMOIZE_GETS";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

/// Reads `.env` if present, then the process environment.
pub fn load_from_env() -> Result<EngineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    let vars: HashMap<String, String> = std::env::vars().collect();
    from_vars(&vars)
}

/// Builds a config from a variable map; unset variables keep their defaults.
pub fn from_vars(vars: &HashMap<String, String>) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::default();
    if let Some(base) = vars.get(ENV_BASE_PATH) {
        config.base_path = base.trim().to_string();
    }
    if let Some(addr) = vars.get(ENV_BIND_ADDR) {
        config.bind_addr = addr.trim().to_string();
    }
    if let Some(limit) = vars.get(ENV_MAX_BODY_BYTES) {
        config.max_body_bytes = limit
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} must be a byte count, got '{}'", ENV_MAX_BODY_BYTES, limit)))?;
    }
    if let Some(flag) = vars.get(ENV_MEMOIZE_GETS) {
        config.memoize_gets = match flag.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(ConfigError::Load(format!("{} must be a boolean, got '{}'", ENV_MEMOIZE_GETS, other)))
            }
        };
    }
    if let Some(filter) = vars.get(ENV_LOG_FILTER) {
        config.log_filter = filter.clone();
    }
    validate(&config)?;
    Ok(config)
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json(&raw)
}

pub fn from_json(raw: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig =
        serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("invalid config json: {}", e)))?;
    validate(&config)?;
    Ok(config)
}
