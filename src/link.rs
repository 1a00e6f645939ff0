//! Links: deferred references to other resources, optionally pre-hydrated.
//!
//! In a document a link is an object tagged with `$link` (the target path); any other
//! keys are pre-attached partial data. Resolving a link fetches only what the
//! attached data cannot already answer.

use crate::connection::{Connection, GetOptions};
use crate::error::EngineError;
use crate::merge::deep_merge;
use crate::path::PropPath;
use crate::pluck::{has_path, is_meta_key, LINK_KEY};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::fmt;

type ThenFn = Box<dyn FnOnce(Value) -> Result<Value, EngineError> + Send>;
type CatchFn = Box<dyn FnOnce(EngineError) -> Result<Value, EngineError> + Send>;
type FinallyFn = Box<dyn FnOnce() + Send>;

/// A continuation attached to a link, applied in registration order after resolution.
pub enum Continuation {
    /// Runs on success; an `Err` turns the outcome into a failure.
    Then(ThenFn),
    /// Runs on failure; an `Ok` recovers the outcome.
    Catch(CatchFn),
    /// Runs regardless of outcome and leaves it unchanged.
    Finally(FinallyFn),
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Continuation::Then(_) => "Then",
            Continuation::Catch(_) => "Catch",
            Continuation::Finally(_) => "Finally",
        };
        f.write_str(kind)
    }
}

#[derive(Debug)]
pub struct Link {
    href: String,
    data: Option<Map<String, Value>>,
    continuations: Vec<Continuation>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Link {
            href: href.into(),
            data: None,
            continuations: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    pub fn then<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, EngineError> + Send + 'static,
    {
        self.continuations.push(Continuation::Then(Box::new(f)));
        self
    }

    pub fn catch<F>(mut self, f: F) -> Self
    where
        F: FnOnce(EngineError) -> Result<Value, EngineError> + Send + 'static,
    {
        self.continuations.push(Continuation::Catch(Box::new(f)));
        self
    }

    pub fn finally<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.continuations.push(Continuation::Finally(Box::new(f)));
        self
    }

    /// Reads a `$link`-tagged object. Other keys become pre-attached data.
    pub fn from_value(value: &Value) -> Option<Link> {
        let map = value.as_object()?;
        let href = map.get(LINK_KEY)?.as_str()?;
        let data: Map<String, Value> = map
            .iter()
            .filter(|(k, _)| k.as_str() != LINK_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let link = Link::new(href);
        Some(if data.is_empty() { link } else { link.with_data(data) })
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.data.clone().unwrap_or_default();
        map.insert(LINK_KEY.to_string(), Value::String(self.href.clone()));
        Value::Object(map)
    }

    /// Requested paths that the attached data cannot answer. With no attached data,
    /// or no requested paths, everything is unmet.
    pub fn unmet<S: AsRef<str>>(&self, props: &[S]) -> Vec<String> {
        let Some(data) = &self.data else {
            return props.iter().map(|p| p.as_ref().to_string()).collect();
        };
        let data = Value::Object(data.clone());
        props
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !has_path(&data, &PropPath::parse(p)))
            .map(str::to_string)
            .collect()
    }

    /// Resolves the link through `connection`, then runs the continuations in order.
    pub async fn resolve<S: AsRef<str>>(
        self,
        connection: &dyn Connection,
        props: &[S],
    ) -> Result<Value, EngineError> {
        let Link {
            href,
            data,
            continuations,
        } = self;
        let outcome = resolve_core(&href, data, connection, props).await;
        apply_continuations(outcome, continuations)
    }
}

async fn resolve_core<S: AsRef<str>>(
    href: &str,
    data: Option<Map<String, Value>>,
    connection: &dyn Connection,
    props: &[S],
) -> Result<Value, EngineError> {
    let link = Link {
        href: href.to_string(),
        data,
        continuations: Vec::new(),
    };
    let unmet = link.unmet(props);
    if !props.is_empty() && unmet.is_empty() {
        tracing::debug!(href, "link satisfied by attached data");
        return Ok(Value::Object(link.data.unwrap_or_default()));
    }
    tracing::debug!(href, unmet = ?unmet, "fetching link");
    let fetched = connection.get(href, GetOptions { props: unmet, ..GetOptions::default() }).await?;
    let mut merged = link.data.map(Value::Object).unwrap_or(Value::Object(Map::new()));
    deep_merge(&mut merged, fetched);
    Ok(merged)
}

fn apply_continuations(
    mut outcome: Result<Value, EngineError>,
    continuations: Vec<Continuation>,
) -> Result<Value, EngineError> {
    for c in continuations {
        outcome = match (outcome, c) {
            (Ok(v), Continuation::Then(f)) => f(v),
            (Err(e), Continuation::Catch(f)) => f(e),
            (o, Continuation::Finally(f)) => {
                f();
                o
            }
            (o, _) => o,
        };
    }
    outcome
}

/// Props aimed at the value under `key`: `key.x` yields `x`, `key@x` yields `@x`.
/// `None` when no path names `key`; an empty list when `key` is asked for whole.
fn props_below(props: &[PropPath], key: &str) -> Option<Vec<PropPath>> {
    let tails: Vec<PropPath> = props
        .iter()
        .filter(|p| p.head().map(|h| h.key == key).unwrap_or(false))
        .map(PropPath::tail)
        .collect();
    if tails.is_empty() {
        None
    } else if tails.iter().any(PropPath::is_empty) {
        Some(Vec::new())
    } else {
        Some(tails)
    }
}

/// Resolves every link reachable in `value`, siblings concurrently. Each link is
/// fetched with the requested paths that point into it. Resolved data replaces the
/// link, keeping the link's own metadata keys. When `props` is non-empty, links no
/// requested path reaches are left as they are.
pub fn resolve_links<'a>(
    value: Value,
    props: Vec<PropPath>,
    connection: &'a dyn Connection,
) -> BoxFuture<'a, Result<Value, EngineError>> {
    let requested = !props.is_empty();
    resolve_within(value, props, requested, connection)
}

fn resolve_within<'a>(
    value: Value,
    props: Vec<PropPath>,
    requested: bool,
    connection: &'a dyn Connection,
) -> BoxFuture<'a, Result<Value, EngineError>> {
    async move {
        if let Some(link) = Link::from_value(&value) {
            let props: Vec<String> = props.iter().map(PropPath::to_string).collect();
            let mut resolved = link.resolve(connection, &props).await?;
            if let (Some(target), Value::Object(source)) = (resolved.as_object_mut(), &value) {
                for (k, v) in source {
                    if is_meta_key(k) && k != LINK_KEY && !target.contains_key(k) {
                        target.insert(k.clone(), v.clone());
                    }
                }
            }
            return Ok(resolved);
        }
        match value {
            Value::Object(map) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                let children = map.into_iter().map(|(k, v)| {
                    if !requested {
                        return resolve_within(v, Vec::new(), false, connection);
                    }
                    match props_below(&props, &k) {
                        // Nothing asked for below this key.
                        None => async move { Ok::<_, EngineError>(v) }.boxed(),
                        Some(below) => {
                            let narrowed = !below.is_empty();
                            resolve_within(v, below, narrowed, connection)
                        }
                    }
                });
                let resolved = try_join_all(children).await?;
                Ok(Value::Object(keys.into_iter().zip(resolved).collect()))
            }
            Value::Array(items) => {
                let mut below: Vec<PropPath> = props.iter().map(PropPath::strip_leading_pluck).collect();
                if below.iter().any(PropPath::is_empty) {
                    below.clear();
                }
                let narrowed = requested && !below.is_empty();
                let children = items
                    .into_iter()
                    .map(|v| resolve_within(v, below.clone(), narrowed, connection));
                Ok(Value::Array(try_join_all(children).await?))
            }
            other => Ok(other),
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Records each fetch and answers from a fixed document.
    struct Recording {
        doc: Value,
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    impl Recording {
        fn new(doc: Value) -> Self {
            Recording {
                doc,
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Recording {
                fail: true,
                ..Recording::new(Value::Null)
            }
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connection for Recording {
        async fn get(&self, path: &str, options: GetOptions) -> Result<Value, EngineError> {
            self.calls.lock().unwrap().push((path.to_string(), options.props.clone()));
            if self.fail {
                return Err(EngineError::NotFound(path.to_string()));
            }
            Ok(self.doc.clone())
        }
    }

    fn attached(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn fully_hydrated_link_does_not_fetch() {
        let conn = Recording::new(json!({}));
        let link = Link::new("/users/1").with_data(attached(json!({ "name": "Ann", "address": { "city": "Oslo" } })));
        let v = link.resolve(&conn, &["name", "address.city"]).await.unwrap();
        assert_eq!(v, json!({ "name": "Ann", "address": { "city": "Oslo" } }));
        assert!(conn.calls().is_empty());
    }

    #[tokio::test]
    async fn partial_link_fetches_only_unmet_props() {
        let conn = Recording::new(json!({ "age": 31, "name": "Annie" }));
        let link = Link::new("/users/1").with_data(attached(json!({ "name": "Ann", "id": 1 })));
        let v = link.resolve(&conn, &["name", "age"]).await.unwrap();
        assert_eq!(conn.calls(), vec![("/users/1".to_string(), vec!["age".to_string()])]);
        assert_eq!(v, json!({ "name": "Annie", "id": 1, "age": 31 }));
    }

    #[tokio::test]
    async fn no_props_always_fetches() {
        let conn = Recording::new(json!({ "age": 31 }));
        let link = Link::new("/users/1").with_data(attached(json!({ "name": "Ann" })));
        let v = link.resolve::<&str>(&conn, &[]).await.unwrap();
        assert_eq!(conn.calls().len(), 1);
        assert_eq!(v, json!({ "name": "Ann", "age": 31 }));
    }

    #[tokio::test]
    async fn continuations_run_in_order_and_catch_recovers() {
        let conn = Recording::failing();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s1, s2, s3) = (seen.clone(), seen.clone(), seen.clone());
        let link = Link::new("/gone")
            .then(move |v| {
                s1.lock().unwrap().push("then-before");
                Ok(v)
            })
            .catch(move |_| {
                s2.lock().unwrap().push("catch");
                Ok(json!({ "fallback": true }))
            })
            .finally(move || s3.lock().unwrap().push("finally"));
        let v = link.resolve(&conn, &["name"]).await.unwrap();
        assert_eq!(v, json!({ "fallback": true }));
        assert_eq!(*seen.lock().unwrap(), vec!["catch", "finally"]);
    }

    #[tokio::test]
    async fn fetch_failure_without_catch_fails() {
        let conn = Recording::failing();
        let err = Link::new("/gone").resolve(&conn, &["name"]).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(p) if p == "/gone"));
    }

    #[tokio::test]
    async fn then_error_turns_into_failure() {
        let conn = Recording::new(json!({ "name": "Ann" }));
        let err = Link::new("/users/1")
            .then(|_| Err(EngineError::Handler("rejected".into())))
            .resolve::<&str>(&conn, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Handler(_)));
    }

    #[test]
    fn value_round_trip() {
        let v = json!({ "$link": "/users/1", "name": "Ann" });
        let link = Link::from_value(&v).unwrap();
        assert_eq!(link.href(), "/users/1");
        assert_eq!(link.unmet(&["name", "age"]), vec!["age"]);
        assert_eq!(link.to_value(), v);
        assert!(Link::from_value(&json!({ "name": "Ann" })).is_none());
    }

    #[tokio::test]
    async fn nested_links_resolve_with_targeted_props() {
        let conn = Recording::new(json!({ "name": "Bob", "email": "b@x" }));
        let doc = json!({
            "title": "post",
            "author": { "$link": "/users/2", "$type": "user" },
            "comments": [{ "by": { "$link": "/users/2", "name": "Bob" } }]
        });
        let props = PropPath::parse_all(&["title", "author.email", "comments@by.name"]);
        let v = resolve_links(doc, props, &conn).await.unwrap();
        assert_eq!(v["author"], json!({ "name": "Bob", "email": "b@x", "$type": "user" }));
        assert_eq!(v["comments"][0]["by"], json!({ "name": "Bob" }));
        // The comment author was hydrated already; only the post author was fetched.
        assert_eq!(conn.calls(), vec![("/users/2".to_string(), vec!["email".to_string()])]);
    }

    #[tokio::test]
    async fn links_outside_the_requested_props_are_left_alone() {
        let conn = Recording::failing();
        let doc = json!({ "title": "Dune", "author": { "$link": "/gone" } });
        let v = resolve_links(doc.clone(), PropPath::parse_all(&["title"]), &conn).await.unwrap();
        assert_eq!(v, doc);
        assert!(conn.calls().is_empty());
    }

    #[tokio::test]
    async fn link_requested_whole_is_fetched_in_full() {
        let conn = Recording::new(json!({ "name": "Frank", "born": 1920 }));
        let doc = json!({ "title": "Dune", "author": { "$link": "/authors/10" } });
        let v = resolve_links(doc, PropPath::parse_all(&["title", "author"]), &conn).await.unwrap();
        assert_eq!(v["author"], json!({ "name": "Frank", "born": 1920 }));
        assert_eq!(conn.calls(), vec![("/authors/10".to_string(), Vec::new())]);
    }

    #[tokio::test]
    async fn unrequested_root_fetches_every_link() {
        let conn = Recording::new(json!({ "name": "Frank" }));
        let doc = json!({ "title": "Dune", "author": { "$link": "/authors/10" } });
        let v = resolve_links(doc, Vec::new(), &conn).await.unwrap();
        assert_eq!(v["author"], json!({ "name": "Frank" }));
        assert_eq!(conn.calls(), vec![("/authors/10".to_string(), Vec::new())]);
    }
}
