//! Connection boundary and the in-process connection that reissues requests against a router.
//!
//! Identical concurrent GETs (same path, same props, same query, compared after
//! sorting) share a single in-flight future. Entries are dropped as soon as the
//! shared call completes, so the cache never serves stale results.

use crate::error::EngineError;
use crate::request::{Method, RequestContext};
use crate::router::Router;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Options for a connection `get`: requested property paths and raw query parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub props: Vec<String>,
    pub query: BTreeMap<String, String>,
}

impl GetOptions {
    pub fn props<S: AsRef<str>>(props: &[S]) -> Self {
        GetOptions {
            props: props.iter().map(|p| p.as_ref().to_string()).collect(),
            query: BTreeMap::new(),
        }
    }

    /// Canonical cache key: props are sorted and deduplicated, the query is already ordered.
    pub fn cache_key(&self, path: &str) -> String {
        let mut props = self.props.clone();
        props.sort();
        props.dedup();
        let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}?props={}&{}", path, props.join(","), query.join("&"))
    }
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn get(&self, path: &str, options: GetOptions) -> Result<Value, EngineError>;
}

type SharedCall = Shared<BoxFuture<'static, Result<Value, EngineError>>>;

/// Connection that dispatches into an in-process [`Router`].
#[derive(Clone)]
pub struct LocalConnection {
    router: Arc<Router>,
    memoize: bool,
    inflight: Arc<Mutex<HashMap<String, SharedCall>>>,
}

impl LocalConnection {
    pub fn new(router: Arc<Router>) -> Self {
        LocalConnection {
            router,
            memoize: true,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn without_memoization(router: Arc<Router>) -> Self {
        LocalConnection {
            memoize: false,
            ..LocalConnection::new(router)
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    fn call(&self, path: &str, options: GetOptions) -> BoxFuture<'static, Result<Value, EngineError>> {
        let router = self.router.clone();
        let mut ctx = RequestContext::new(Method::Get, path);
        ctx.set_props(options.props);
        ctx.set_query(options.query);
        ctx.set_connection(Arc::new(self.clone()));
        async move { router.handle(ctx).await.map(|response| response.body) }.boxed()
    }

    /// Drops the entry for `key` if it is still `call`; a later call may own it by now.
    fn evict(&self, key: &str, call: &SharedCall) {
        if let Ok(mut inflight) = self.inflight.lock() {
            if inflight.get(key).is_some_and(|current| current.ptr_eq(call)) {
                inflight.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.inflight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Connection for LocalConnection {
    async fn get(&self, path: &str, options: GetOptions) -> Result<Value, EngineError> {
        if !self.memoize {
            return self.call(path, options).await;
        }
        let key = options.cache_key(path);
        let shared = {
            let mut inflight = self
                .inflight
                .lock()
                .map_err(|_| EngineError::Internal("connection cache poisoned".into()))?;
            match inflight.get(&key) {
                Some(existing) => {
                    tracing::debug!(%key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let fut = self.call(path, options).shared();
                    inflight.insert(key.clone(), fut.clone());
                    fut
                }
            }
        };
        let result = shared.clone().await;
        self.evict(&key, &shared);
        result
    }
}
