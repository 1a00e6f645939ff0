//! Engine settings as read from the environment or a JSON file.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "resource_engine=info";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix stripped from every request path before routing, e.g. `/api`.
    pub base_path: String,
    pub bind_addr: String,
    /// Upper bound for request bodies, uploads included.
    pub max_body_bytes: usize,
    /// Share identical in-flight GETs issued through the in-process connection.
    pub memoize_gets: bool,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_path: String::new(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            memoize_gets: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// `path` with the base path removed; `None` when it lies outside the base path.
    pub fn strip_base<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.base_path.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.base_path.as_str())?;
        match rest {
            "" => Some("/"),
            r if r.starts_with('/') => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_base_respects_segment_boundaries() {
        let config = EngineConfig {
            base_path: "/api".into(),
            ..EngineConfig::default()
        };
        assert_eq!(config.strip_base("/api/users/1"), Some("/users/1"));
        assert_eq!(config.strip_base("/api"), Some("/"));
        assert_eq!(config.strip_base("/apix/users"), None);
        assert_eq!(config.strip_base("/users"), None);
        assert_eq!(EngineConfig::default().strip_base("/users"), Some("/users"));
    }
}
