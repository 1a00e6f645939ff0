//! A route: one path pattern, its schema, and the handlers registered per method.

use crate::error::{ConfigError, EngineError};
use crate::path::PropPath;
use crate::request::{Method, RequestContext};
use crate::router::handler::{FnHandler, Handler, Output};
use crate::router::pattern::PathPattern;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// A handler that answers part of a resource.
#[derive(Clone)]
pub struct PartialHandler {
    props: Vec<String>,
    handler: Arc<dyn Handler>,
}

impl PartialHandler {
    pub fn props(&self) -> &[String] {
        &self.props
    }

    /// An entry with no declared props runs for every request.
    fn wanted(&self, requested: &[String]) -> bool {
        if self.props.is_empty() || requested.is_empty() {
            return true;
        }
        let requested: Vec<PropPath> = PropPath::parse_all(requested);
        self.props.iter().any(|declared| {
            let declared = PropPath::parse(declared);
            requested.iter().any(|r| r.root_key().is_some() && r.root_key() == declared.root_key())
        })
    }
}

#[derive(Clone)]
pub enum HandlerSet {
    Single(Arc<dyn Handler>),
    Partial(Vec<PartialHandler>),
}

impl HandlerSet {
    /// Handlers to run for `requested`, in registration order. A single handler
    /// always runs; partial handlers run when their props intersect the request,
    /// or all of them when nothing specific was requested.
    pub fn select(&self, requested: &[String]) -> Vec<Arc<dyn Handler>> {
        match self {
            HandlerSet::Single(h) => vec![h.clone()],
            HandlerSet::Partial(entries) => entries
                .iter()
                .filter(|e| e.wanted(requested))
                .map(|e| e.handler.clone())
                .collect(),
        }
    }

    fn declared_props(&self) -> Vec<String> {
        match self {
            HandlerSet::Single(_) => Vec::new(),
            HandlerSet::Partial(entries) => entries.iter().flat_map(|e| e.props.clone()).collect(),
        }
    }
}

#[derive(Clone)]
pub struct Route {
    pattern: PathPattern,
    schema: Value,
    query_schema: Option<Value>,
    handlers: BTreeMap<Method, HandlerSet>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.as_str())
            .field("methods", &self.methods())
            .finish()
    }
}

impl Route {
    pub fn new(pattern: &str, schema: Value) -> Result<Self, ConfigError> {
        Ok(Route {
            pattern: PathPattern::compile(pattern)?,
            schema,
            query_schema: None,
            handlers: BTreeMap::new(),
        })
    }

    /// Declares the query parameters accepted by GET and their defaults.
    pub fn query_schema(mut self, schema: Value) -> Self {
        self.query_schema = Some(schema);
        self
    }

    /// Registers `handler` as the only handler for `method`, replacing any earlier one.
    pub fn on_handler(mut self, method: Method, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(method, HandlerSet::Single(handler));
        self
    }

    /// Adds a handler answering `props` of the resource. A single handler already
    /// registered for `method` is kept as an entry that runs on every request.
    pub fn on_props_handler(mut self, method: Method, props: Vec<String>, handler: Arc<dyn Handler>) -> Self {
        let entry = PartialHandler { props, handler };
        let set = match self.handlers.remove(&method) {
            None => HandlerSet::Partial(vec![entry]),
            Some(HandlerSet::Single(existing)) => HandlerSet::Partial(vec![
                PartialHandler {
                    props: Vec::new(),
                    handler: existing,
                },
                entry,
            ]),
            Some(HandlerSet::Partial(mut entries)) => {
                entries.push(entry);
                HandlerSet::Partial(entries)
            }
        };
        self.handlers.insert(method, set);
        self
    }

    pub fn on<F, Fut>(self, method: Method, f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        self.on_handler(method, Arc::new(FnHandler(f)))
    }

    pub fn on_props<F, Fut>(self, method: Method, props: &[&str], f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        let props = props.iter().map(|p| p.to_string()).collect();
        self.on_props_handler(method, props, Arc::new(FnHandler(f)))
    }

    pub fn get<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        self.on(Method::Get, f)
    }

    pub fn post<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        self.on(Method::Post, f)
    }

    pub fn put<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        self.on(Method::Put, f)
    }

    pub fn patch<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        self.on(Method::Patch, f)
    }

    pub fn delete<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
    {
        self.on(Method::Delete, f)
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn query(&self) -> Option<&Value> {
        self.query_schema.as_ref()
    }

    pub fn handlers(&self, method: Method) -> Option<&HandlerSet> {
        self.handlers.get(&method)
    }

    /// Registered methods plus OPTIONS, which every route answers.
    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().copied().collect();
        if !methods.contains(&Method::Options) {
            methods.push(Method::Options);
        }
        methods
    }

    pub fn docs(&self) -> Value {
        let props: BTreeMap<String, Vec<String>> = self
            .handlers
            .iter()
            .filter_map(|(m, set)| {
                let declared = set.declared_props();
                (!declared.is_empty()).then(|| (m.to_string(), declared))
            })
            .collect();
        json!({
            "path": self.pattern.as_str(),
            "methods": self.methods(),
            "schema": self.schema,
            "query": self.query_schema,
            "props": props,
        })
    }
}
