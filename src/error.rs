//! Typed errors and HTTP mapping.

use crate::request::{Method, UploadError};
use crate::schema::PropertyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("invalid path pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("invalid base path '{0}': must be empty or start with '/' and not end with '/'")]
    InvalidBasePath(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Accumulated per-property violations for one request or one result document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub message: String,
    pub properties: Vec<PropertyError>,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>, properties: Vec<PropertyError>) -> Self {
        ValidationFailure {
            message: message.into(),
            properties,
        }
    }

    pub fn paths(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.property.as_str()).collect()
    }
}

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("no handler for {method} {path}")]
    NoHandler { method: Method, path: String },
    #[error("validation: {}", .0.message)]
    Validation(ValidationFailure),
    #[error("unresolved properties: {}", .0.join(", "))]
    UnresolvedProperties(Vec<String>),
    /// A handler produced a document its own schema rejects. Clients only see the
    /// `invalid_result` symbol; the failing paths are logged by the router.
    #[error("result failed schema validation: {}", .0.message)]
    InvalidResult(ValidationFailure),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("fetch {path}: {message}")]
    Fetch { path: String, message: String },
    #[error("pagination mode is {actual}, not {expected}")]
    PaginationMode {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("handler: {0}")]
    Handler(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) | EngineError::NoHandler { .. } => StatusCode::NOT_FOUND,
            EngineError::Validation(_)
            | EngineError::UnresolvedProperties(_)
            | EngineError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::Upload(UploadError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            EngineError::Upload(_) => StatusCode::BAD_REQUEST,
            EngineError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            EngineError::Config(_)
            | EngineError::InvalidResult(_)
            | EngineError::PaginationMode { .. }
            | EngineError::InvalidSchema(_)
            | EngineError::Handler(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "config_error",
            EngineError::NotFound(_) | EngineError::NoHandler { .. } => "not_found",
            EngineError::Validation(_) => "validation_error",
            EngineError::UnresolvedProperties(_) => "unresolved_properties",
            EngineError::InvalidResult(_) => "invalid_result",
            EngineError::Upload(_) => "upload_error",
            EngineError::Fetch { .. } => "fetch_error",
            EngineError::PaginationMode { .. } => "pagination_mode",
            EngineError::InvalidSchema(_) => "invalid_schema",
            EngineError::BadRequest(_) => "bad_request",
            EngineError::Handler(_) => "handler_error",
            EngineError::Internal(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let status = self.status();
        // Routing failures stay generic; internal detail never reaches the client.
        let message = match self {
            EngineError::NotFound(_) | EngineError::NoHandler { .. } => "not found".to_string(),
            EngineError::InvalidResult(_) | EngineError::Internal(_) | EngineError::Config(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let properties = match self {
            EngineError::Validation(failure) => failure.properties.clone(),
            _ => Vec::new(),
        };
        ErrorBody {
            code: status.as_u16(),
            error: self.symbol().to_string(),
            message,
            properties,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyError>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}
