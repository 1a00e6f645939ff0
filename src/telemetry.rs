//! Tracing subscriber setup for binaries embedding the engine.

use crate::config::EngineConfig;
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber. `RUST_LOG` wins over the configured filter.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
