//! Resource engine: declarative, schema-validated resource API over a route table.
//!
//! Routes pair a path pattern with a JSON schema and per-method handlers. Requests
//! are cast and validated against the schema, partial handlers are selected by the
//! requested properties, their results merged, projected and validated again.

pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod link;
pub mod merge;
pub mod path;
pub mod pluck;
pub mod request;
pub mod response;
pub mod router;
pub mod routes;
pub mod schema;
pub mod state;
pub mod telemetry;

pub use collection::{etag_matches, Collection, Pagination};
pub use config::{load_from_env, load_from_file, EngineConfig};
pub use connection::{Connection, GetOptions, LocalConnection};
pub use error::{ConfigError, EngineError, ValidationFailure};
pub use link::{resolve_links, Link};
pub use merge::{deep_merge, merge_all};
pub use path::{PropPath, Segment};
pub use pluck::pluck;
pub use request::{Method, RequestContext, UploadError, UploadedFile};
pub use router::{
    EngineEvent, EventListener, Handler, Output, Representable, Response, Route, Router, RouterBuilder,
    TracingListener,
};
pub use routes::{common_routes, resource_routes};
pub use schema::{locate, JsonSchemaValidator, PropertyError, SchemaValidator};
pub use state::AppState;
pub use telemetry::init_tracing;
