//! Per-call request context: parameters, query, requested props, body, and uploads.

mod cast;
mod context;
mod method;
mod upload;

pub use cast::{cast_param, cast_scalar, cast_value};
pub use context::{RequestContext, PROPS_PARAM};
pub use method::Method;
pub use upload::{drain_upload, mime_matches, UploadCheck, UploadError, UploadPart, UploadedFile};
