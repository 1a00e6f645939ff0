//! Path patterns compiled to anchored regular expressions.
//!
//! `/users/:id` captures one segment, `/files/:name?` makes the last segment optional,
//! and a trailing `*` captures the rest of the path under the key `splat`.

use crate::error::ConfigError;
use regex::Regex;

pub const SPLAT_KEY: &str = "splat";

#[derive(Clone, Debug)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    keys: Vec<String>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };
        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut keys: Vec<String> = Vec::new();
        let mut re = String::from("^");
        let segments: Vec<&str> = pattern.split('/').skip(1).filter(|s| !s.is_empty()).collect();
        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            if *segment == "*" {
                if !last {
                    return Err(invalid("'*' is only allowed as the last segment"));
                }
                keys.push(SPLAT_KEY.to_string());
                re.push_str(&format!("(?:/(?P<{}>.*))?", SPLAT_KEY));
            } else if let Some(name) = segment.strip_prefix(':') {
                let (name, optional) = match name.strip_suffix('?') {
                    Some(n) => (n, true),
                    None => (name, false),
                };
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid("parameter names must be alphanumeric"));
                }
                if keys.iter().any(|k| k == name) {
                    return Err(invalid("duplicate parameter name"));
                }
                if optional && !last {
                    return Err(invalid("only the last parameter may be optional"));
                }
                keys.push(name.to_string());
                if optional {
                    re.push_str(&format!("(?:/(?P<{}>[^/]+))?", name));
                } else {
                    re.push_str(&format!("/(?P<{}>[^/]+)", name));
                }
            } else {
                re.push('/');
                re.push_str(&regex::escape(segment));
            }
        }
        re.push_str("/?$");

        let regex = Regex::new(&re).map_err(|e| invalid(&e.to_string()))?;
        Ok(PathPattern {
            source: pattern.to_string(),
            regex,
            keys,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Capture values aligned with [`PathPattern::keys`], or `None` when the path does not match.
    pub fn match_path(&self, path: &str) -> Option<Vec<Option<String>>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.keys
                .iter()
                .map(|k| caps.name(k).map(|m| m.as_str().to_string()))
                .collect(),
        )
    }

    /// Present captures as (key, value) pairs.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let values = self.match_path(path)?;
        Some(
            self.keys
                .iter()
                .zip(values)
                .filter_map(|(k, v)| v.map(|v| (k.clone(), v)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_captures_align_with_keys() {
        let p = PathPattern::compile("/users/:id/posts/:post_id").unwrap();
        assert_eq!(p.keys(), &["id".to_string(), "post_id".to_string()]);
        assert_eq!(
            p.match_path("/users/42/posts/7"),
            Some(vec![Some("42".to_string()), Some("7".to_string())])
        );
        assert!(p.match_path("/users/42").is_none());
        assert!(p.match_path("/users/42/posts/7/extra").is_none());
    }

    #[test]
    fn literals_are_escaped_and_trailing_slash_allowed() {
        let p = PathPattern::compile("/v1.0/items").unwrap();
        assert!(p.match_path("/v1.0/items/").is_some());
        assert!(p.match_path("/v1x0/items").is_none());
        let root = PathPattern::compile("/").unwrap();
        assert!(root.match_path("/").is_some());
        assert!(root.match_path("").is_some());
    }

    #[test]
    fn optional_and_splat() {
        let p = PathPattern::compile("/files/:name?").unwrap();
        assert_eq!(p.captures("/files"), Some(vec![]));
        assert_eq!(p.captures("/files/a.txt"), Some(vec![("name".into(), "a.txt".into())]));

        let p = PathPattern::compile("/static/*").unwrap();
        assert_eq!(
            p.captures("/static/css/site.css"),
            Some(vec![(SPLAT_KEY.into(), "css/site.css".into())])
        );
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(PathPattern::compile("users").is_err());
        assert!(PathPattern::compile("/a/:x/:x").is_err());
        assert!(PathPattern::compile("/a/:x?/b").is_err());
        assert!(PathPattern::compile("/a/*/b").is_err());
        assert!(PathPattern::compile("/a/:bad-name").is_err());
    }
}
