//! Route table and request dispatch.

mod dispatch;
mod events;
mod handler;
mod pattern;
mod route;

pub use dispatch::{Response, Router, RouterBuilder};
pub use events::{EngineEvent, EventListener, RecordingListener, TracingListener};
pub use handler::{FnHandler, Handler, Output, Representable};
pub use pattern::{PathPattern, SPLAT_KEY};
pub use route::{HandlerSet, PartialHandler, Route};
