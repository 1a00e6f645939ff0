//! Collections: ordered items with identity, expiry, totals, and one pagination mode.

use crate::error::EngineError;
use crate::pluck::LINK_KEY;
use crate::request::{RequestContext, PROPS_PARAM};
use crate::router::Representable;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Pagination mode, fixed when the collection is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pagination {
    None,
    Offset { offset: u64, limit: u64 },
    Cursor { cursor: Option<String>, next: Option<String> },
}

impl Pagination {
    fn mode(&self) -> &'static str {
        match self {
            Pagination::None => "none",
            Pagination::Offset { .. } => "offset",
            Pagination::Cursor { .. } => "cursor",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    id: Option<String>,
    expires: Option<u64>,
    total: Option<u64>,
    items: Vec<Value>,
    pagination: Pagination,
}

impl Collection {
    pub fn new(items: Vec<Value>) -> Self {
        Collection {
            id: None,
            expires: None,
            total: None,
            items,
            pagination: Pagination::None,
        }
    }

    pub fn with_offset(items: Vec<Value>, offset: u64, limit: u64) -> Self {
        Collection {
            pagination: Pagination::Offset { offset, limit },
            ..Collection::new(items)
        }
    }

    pub fn with_cursor(items: Vec<Value>, cursor: Option<String>, next: Option<String>) -> Self {
        Collection {
            pagination: Pagination::Cursor { cursor, next },
            ..Collection::new(items)
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Expiry budget in seconds.
    pub fn expires(mut self, seconds: u64) -> Self {
        self.expires = Some(seconds);
        self
    }

    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn offset(&self) -> Result<u64, EngineError> {
        match self.pagination {
            Pagination::Offset { offset, .. } => Ok(offset),
            ref other => Err(mode_error("offset", other)),
        }
    }

    pub fn limit(&self) -> Result<u64, EngineError> {
        match self.pagination {
            Pagination::Offset { limit, .. } => Ok(limit),
            ref other => Err(mode_error("offset", other)),
        }
    }

    pub fn cursor(&self) -> Result<Option<&str>, EngineError> {
        match &self.pagination {
            Pagination::Cursor { cursor, .. } => Ok(cursor.as_deref()),
            other => Err(mode_error("cursor", other)),
        }
    }

    pub fn next_cursor(&self) -> Result<Option<&str>, EngineError> {
        match &self.pagination {
            Pagination::Cursor { next, .. } => Ok(next.as_deref()),
            other => Err(mode_error("cursor", other)),
        }
    }

    /// Weak validator for this collection as answered to `ctx`, or `None` when the
    /// collection or any item lacks an identity, or no expiry was set.
    pub fn fingerprint(&self, ctx: &RequestContext) -> Option<String> {
        self.id.as_ref()?;
        self.expires?;
        let identities = self
            .items
            .iter()
            .map(item_identity)
            .collect::<Option<Vec<String>>>()?;

        let mut props: Vec<String> = ctx.props().to_vec();
        props.sort();
        let mut query: Vec<String> = ctx
            .query()
            .iter()
            .filter(|(k, _)| k.as_str() != PROPS_PARAM)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        query.sort();

        let canonical = json!([identities, props, query]).to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        Some(format!("W/\"{}\"", hex::encode(digest)))
    }
}

fn mode_error(expected: &'static str, actual: &Pagination) -> EngineError {
    EngineError::PaginationMode {
        expected,
        actual: actual.mode(),
    }
}

fn item_identity(item: &Value) -> Option<String> {
    let id = item.get(LINK_KEY).or_else(|| item.get("$id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Exact comparison against a freshly computed validator.
pub fn etag_matches(candidate: &str, fresh: &str) -> bool {
    candidate.trim() == fresh
}

impl Representable for Collection {
    fn to_representation(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert("$id".into(), Value::String(id.clone()));
        }
        if let Some(expires) = self.expires {
            map.insert("$expires".into(), json!(expires));
        }
        if let Some(total) = self.total {
            map.insert("$total".into(), json!(total));
        }
        match &self.pagination {
            Pagination::None => {}
            Pagination::Offset { offset, limit } => {
                map.insert("$offset".into(), json!(offset));
                map.insert("$limit".into(), json!(limit));
            }
            Pagination::Cursor { cursor, next } => {
                map.insert("$cursor".into(), json!(cursor));
                map.insert("$next".into(), json!(next));
            }
        }
        map.insert("items".into(), Value::Array(self.items.clone()));
        Value::Object(map)
    }

    fn fingerprint(&self, ctx: &RequestContext) -> Option<String> {
        Collection::fingerprint(self, ctx)
    }

    fn max_age(&self) -> Option<u64> {
        self.expires
    }
}
