//! Handler boundary: what a handler receives and what it may return.

use crate::error::EngineError;
use crate::request::RequestContext;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Something that knows its own representation and, optionally, a cache validator.
pub trait Representable: Send + Sync {
    fn to_representation(&self) -> Value;

    /// Weak validator for the representation as answered to `ctx`.
    fn fingerprint(&self, _ctx: &RequestContext) -> Option<String> {
        None
    }

    /// Seconds the representation may be cached for.
    fn max_age(&self) -> Option<u64> {
        None
    }
}

/// What a handler produces.
pub enum Output {
    /// A plain document, merged with the output of sibling handlers.
    Value(Value),
    /// A value that renders itself and may carry a fingerprint.
    Represent(Box<dyn Representable>),
    /// A custom status and body, returned as is.
    Respond { status: u16, body: Value },
}

impl Output {
    pub fn represent<R: Representable + 'static>(value: R) -> Self {
        Output::Represent(Box::new(value))
    }

    pub fn respond(status: u16, body: Value) -> Self {
        Output::Respond { status, body }
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Output::Represent(r) => f.debug_tuple("Represent").field(&r.to_representation()).finish(),
            Output::Respond { status, body } => f
                .debug_struct("Respond")
                .field("status", status)
                .field("body", body)
                .finish(),
        }
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: Arc<RequestContext>) -> Result<Output, EngineError>;
}

/// Adapts an async closure to [`Handler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<RequestContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Output, EngineError>> + Send + 'static,
{
    async fn call(&self, ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
        (self.0)(ctx).await
    }
}
