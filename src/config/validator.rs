//! Config validation.

use crate::config::EngineConfig;
use crate::error::ConfigError;
use std::net::SocketAddr;

pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    let base = config.base_path.as_str();
    if !base.is_empty() && (!base.starts_with('/') || base.ends_with('/')) {
        return Err(ConfigError::InvalidBasePath(base.to_string()));
    }
    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation("max_body_bytes must be greater than zero".into()));
    }
    config
        .bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Validation(format!("bind_addr '{}': {}", config.bind_addr, e)))?;
    Ok(())
}
