//! Request dispatch: match, bind, run handlers, merge, reconcile props, validate.

use crate::connection::LocalConnection;
use crate::error::{EngineError, ValidationFailure};
use crate::merge::merge_all;
use crate::path::PropPath;
use crate::pluck::{is_meta_key, is_pluck_error, missing_paths, pluck, LINK_KEY};
use crate::request::{Method, RequestContext};
use crate::router::events::{EngineEvent, EventListener};
use crate::router::handler::Output;
use crate::router::route::Route;
use crate::schema::{relax_required, JsonSchemaValidator, PropertyError, SchemaValidator};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// Result of a successful dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
    /// Weak validator, set only when a single representable produced the body.
    pub etag: Option<String>,
    pub max_age: Option<u64>,
}

impl Response {
    pub fn ok(body: Value) -> Self {
        Response {
            status: 200,
            body,
            etag: None,
            max_age: None,
        }
    }
}

pub struct RouterBuilder {
    routes: Vec<Route>,
    listeners: Vec<Arc<dyn EventListener>>,
    validator: Arc<dyn SchemaValidator>,
    memoize_gets: bool,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        RouterBuilder {
            routes: Vec::new(),
            listeners: Vec::new(),
            validator: Arc::new(JsonSchemaValidator::new()),
            memoize_gets: true,
        }
    }

    /// Routes are tried in registration order.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Whether connections created by the router share identical in-flight GETs.
    pub fn memoize_gets(mut self, memoize: bool) -> Self {
        self.memoize_gets = memoize;
        self
    }

    pub fn build(self) -> Arc<Router> {
        tracing::debug!(routes = self.routes.len(), listeners = self.listeners.len(), "router built");
        Arc::new(Router {
            routes: self.routes,
            listeners: self.listeners,
            validator: self.validator,
            memoize_gets: self.memoize_gets,
        })
    }
}

pub struct Router {
    routes: Vec<Route>,
    listeners: Vec<Arc<dyn EventListener>>,
    validator: Arc<dyn SchemaValidator>,
    memoize_gets: bool,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Router {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The full route table.
    pub fn docs(&self) -> Value {
        Value::Array(self.routes.iter().map(Route::docs).collect())
    }

    /// First route whose pattern matches `path`, with its captures.
    pub fn find(&self, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        self.routes
            .iter()
            .find_map(|r| r.pattern().captures(path).map(|caps| (r, caps)))
    }

    pub fn schema_for(&self, path: &str) -> Option<&Value> {
        self.find(path).map(|(route, _)| route.schema())
    }

    pub fn connection(self: &Arc<Self>) -> LocalConnection {
        if self.memoize_gets {
            LocalConnection::new(self.clone())
        } else {
            LocalConnection::without_memoization(self.clone())
        }
    }

    fn emit(&self, event: EngineEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    /// Dispatches one request. Exactly one success or error event is emitted per call.
    pub async fn handle(self: &Arc<Self>, mut ctx: RequestContext) -> Result<Response, EngineError> {
        let started = Instant::now();
        if !ctx.has_connection() {
            ctx.set_connection(Arc::new(self.connection()));
        }
        let method = ctx.method();
        let path = ctx.path().to_string();

        let (schema, result) = self.run(ctx).await;
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => self.emit(EngineEvent::Success {
                method,
                path,
                schema: schema.unwrap_or(Value::Null),
                elapsed,
            }),
            Err(error) => self.emit(EngineEvent::Error {
                method,
                path,
                schema,
                error: error.clone(),
                elapsed,
            }),
        }
        result
    }

    async fn run(&self, ctx: RequestContext) -> (Option<Value>, Result<Response, EngineError>) {
        if ctx.method() == Method::Options && is_root(ctx.path()) {
            return (None, Ok(Response::ok(self.docs())));
        }
        let Some((route, captures)) = self.find(ctx.path()) else {
            let err = EngineError::NotFound(ctx.path().to_string());
            return (None, Err(err));
        };
        let result = self.run_route(route, captures, ctx).await;
        (Some(route.schema().clone()), result)
    }

    async fn run_route(
        &self,
        route: &Route,
        captures: Vec<(String, String)>,
        mut ctx: RequestContext,
    ) -> Result<Response, EngineError> {
        let method = ctx.method();
        if method == Method::Options {
            return Ok(Response::ok(route.docs()));
        }
        let set = route.handlers(method).ok_or_else(|| EngineError::NoHandler {
            method,
            path: ctx.path().to_string(),
        })?;

        ctx.bind(captures, route.schema(), route.query(), self.validator.as_ref())?;
        ctx.check_errors()?;

        let selected = set.select(ctx.props());
        let ctx = Arc::new(ctx);
        for _ in &selected {
            self.emit(EngineEvent::HandlerInvoked {
                method,
                path: ctx.path().to_string(),
                pattern: route.pattern().as_str().to_string(),
                props: ctx.props().to_vec(),
            });
        }
        let outputs = try_join_all(selected.iter().map(|h| h.call(ctx.clone()))).await?;
        // Handlers may have recorded property errors of their own.
        ctx.check_errors()?;

        let single = outputs.len() == 1;
        let mut etag = None;
        let mut max_age = None;
        let mut values = Vec::with_capacity(outputs.len());
        for output in outputs {
            match output {
                Output::Respond { status, body } => {
                    tracing::debug!(status, "handler returned a custom response");
                    return Ok(Response {
                        status,
                        body,
                        etag: None,
                        max_age: None,
                    });
                }
                Output::Value(v) => values.push(v),
                Output::Represent(r) => {
                    if single {
                        etag = r.fingerprint(&ctx);
                        max_age = r.max_age();
                    }
                    values.push(r.to_representation());
                }
            }
        }

        // No handler claimed any requested prop: only request parameters can answer.
        let merged = if values.is_empty() {
            Value::Object(Map::new())
        } else {
            merge_all(values)
        };
        let body = reconcile(merged, &ctx)?;
        self.validate_result(route, &ctx, &body)?;
        Ok(Response {
            status: 200,
            body,
            etag,
            max_age,
        })
    }

    /// Checks the merged result against the route schema. Partial results (projected,
    /// or carrying unresolved links) are checked without `required`.
    fn validate_result(&self, route: &Route, ctx: &RequestContext, body: &Value) -> Result<(), EngineError> {
        // Only non-GET methods may answer with a null body.
        if body.is_null() && ctx.method() != Method::Get {
            return Ok(());
        }
        let partial = !ctx.props().is_empty() || contains_link(body);
        let contract = if partial {
            relax_required(route.schema())
        } else {
            route.schema().clone()
        };
        let report = self.validator.validate(&contract, &validation_view(body))?;
        if report.valid {
            return Ok(());
        }
        let properties: Vec<PropertyError> = report
            .errors
            .into_iter()
            .map(|v| PropertyError::from_code(v.path, crate::schema::code_for_keyword(&v.keyword)))
            .collect();
        tracing::error!(
            pattern = route.pattern().as_str(),
            errors = ?properties.iter().map(|p| p.property.as_str()).collect::<Vec<_>>(),
            "handler result does not match its schema"
        );
        Err(EngineError::InvalidResult(ValidationFailure::new(
            format!("result for {} does not match its schema", route.pattern().as_str()),
            properties,
        )))
    }
}

fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Narrows the merged result to the requested props. Missing top-level props are
/// filled from same-named request parameters before anything is reported unresolved.
fn reconcile(merged: Value, ctx: &RequestContext) -> Result<Value, EngineError> {
    let props = ctx.props();
    if props.is_empty() {
        return Ok(merged);
    }
    let projected = match merged {
        Value::Object(map) => reconcile_object(map, ctx)?,
        other @ Value::Array(_) => pluck(&other, props),
        // A null or scalar result holds none of the requested props.
        _ => reconcile_object(Map::new(), ctx)?,
    };
    if is_pluck_error(&projected) {
        return Err(EngineError::UnresolvedProperties(missing_paths(&projected)));
    }
    Ok(projected)
}

fn reconcile_object(mut map: Map<String, Value>, ctx: &RequestContext) -> Result<Value, EngineError> {
    if map.contains_key(LINK_KEY) {
        return Ok(Value::Object(map));
    }
    let props = ctx.props();
    let paths = PropPath::parse_all(props);
    let mut wanted: Vec<&str> = Vec::new();
    for root in paths.iter().filter_map(PropPath::root_key) {
        if !wanted.contains(&root) {
            wanted.push(root);
        }
    }
    map.retain(|k, _| is_meta_key(k) || wanted.contains(&k.as_str()));

    let mut unresolved = Vec::new();
    for key in wanted {
        if map.contains_key(key) {
            continue;
        }
        match ctx.param(key) {
            Some(v) => {
                map.insert(key.to_string(), v.clone());
            }
            None => unresolved.push(key.to_string()),
        }
    }
    if !unresolved.is_empty() {
        return Err(EngineError::UnresolvedProperties(unresolved));
    }
    Ok(pluck(&Value::Object(map), props))
}

fn contains_link(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key(LINK_KEY) || map.values().any(contains_link),
        Value::Array(items) => items.iter().any(contains_link),
        _ => false,
    }
}

/// The value as the schema sees it: metadata keys removed, links replaced by their
/// attached data.
fn validation_view(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !is_meta_key(k))
                .map(|(k, v)| (k.clone(), validation_view(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(validation_view).collect()),
        other => other.clone(),
    }
}
