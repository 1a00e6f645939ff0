//! Incremental checks for uploaded file streams.
//!
//! A `file` leaf in a route schema may declare `maxSize` (bytes) and `mimes`, an
//! allow-list of MIME patterns where one segment may be `*` (`image/*`). A violation
//! is recorded as soon as it is seen; later chunks are drained without further
//! checks so the transport is never aborted from here.

use futures::{Stream, StreamExt};
use serde_json::Value;
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("upload '{field}' exceeds {max} bytes")]
    TooLarge { field: String, max: u64 },
    #[error("upload '{field}' has disallowed type '{mime}'")]
    MimeNotAllowed { field: String, mime: String },
    #[error("expected upload '{0}' is missing")]
    MissingField(String),
    #[error("field '{0}' does not accept uploads")]
    Undeclared(String),
    #[error("upload '{field}' failed: {message}")]
    Transport { field: String, message: String },
}

/// Metadata of one multipart file part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadPart {
    pub field: String,
    pub filename: Option<String>,
    pub encoding: Option<String>,
    pub mime: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: String,
    pub filename: Option<String>,
    pub encoding: Option<String>,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `image/*` matches `image/png`; anything else must match exactly (case-insensitive).
pub fn mime_matches(pattern: &str, mime: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    // Parameters such as `; charset=utf-8` do not take part in matching.
    let mime = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match (pattern.split_once('/'), mime.split_once('/')) {
        (Some((pt, ps)), Some((mt, ms))) => (pt == "*" || pt == mt) && (ps == "*" || ps == ms),
        _ => pattern == mime,
    }
}

#[derive(Clone, Debug)]
pub struct UploadCheck {
    field: String,
    max_size: Option<u64>,
    mimes: Vec<String>,
    seen: u64,
    failure: Option<UploadError>,
}

impl UploadCheck {
    pub fn unchecked(field: impl Into<String>) -> Self {
        UploadCheck {
            field: field.into(),
            max_size: None,
            mimes: Vec::new(),
            seen: 0,
            failure: None,
        }
    }

    /// Builds the check from a `file` schema leaf. A leaf of any other type rejects the part.
    pub fn from_schema(field: impl Into<String>, leaf: &Value) -> Self {
        let field = field.into();
        let mut check = UploadCheck::unchecked(field.clone());
        if leaf.get("type").and_then(Value::as_str) != Some("file") {
            check.failure = Some(UploadError::Undeclared(field));
            return check;
        }
        check.max_size = leaf.get("maxSize").and_then(Value::as_u64);
        check.mimes = match leaf.get("mimes") {
            Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            Some(Value::String(one)) => vec![one.clone()],
            _ => Vec::new(),
        };
        check
    }

    pub fn failure(&self) -> Option<&UploadError> {
        self.failure.as_ref()
    }

    pub fn check_mime(&mut self, mime: Option<&str>) -> Result<(), UploadError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        if self.mimes.is_empty() {
            return Ok(());
        }
        let mime = mime.unwrap_or("application/octet-stream");
        if self.mimes.iter().any(|p| mime_matches(p, mime)) {
            return Ok(());
        }
        let err = UploadError::MimeNotAllowed {
            field: self.field.clone(),
            mime: mime.to_string(),
        };
        self.failure = Some(err.clone());
        Err(err)
    }

    /// Accounts for one chunk. Once failed, further chunks are not checked.
    pub fn check_chunk(&mut self, len: usize) -> Result<(), UploadError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        self.seen += len as u64;
        match self.max_size {
            Some(max) if self.seen > max => {
                let err = UploadError::TooLarge {
                    field: self.field.clone(),
                    max,
                };
                self.failure = Some(err.clone());
                Err(err)
            }
            _ => Ok(()),
        }
    }
}

/// Reads `stream` to its end, checking each chunk. The stream is always drained,
/// even after a violation; buffering stops at the first violation.
pub async fn drain_upload<S, B, E>(
    part: UploadPart,
    mut check: UploadCheck,
    stream: S,
) -> Result<UploadedFile, UploadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut bytes = Vec::new();
    let mut first = true;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UploadError::Transport {
            field: part.field.clone(),
            message: e.to_string(),
        })?;
        if check.failure().is_some() {
            continue;
        }
        if first {
            first = false;
            if let Err(e) = check.check_mime(part.mime.as_deref()) {
                tracing::debug!(field = %part.field, error = %e, "upload rejected");
                continue;
            }
        }
        match check.check_chunk(chunk.as_ref().len()) {
            Ok(()) => bytes.extend_from_slice(chunk.as_ref()),
            Err(e) => {
                tracing::debug!(field = %part.field, error = %e, "upload rejected");
                bytes.clear();
            }
        }
    }
    if first {
        check.check_mime(part.mime.as_deref())?;
    }
    if let Some(e) = check.failure() {
        return Err(e.clone());
    }
    Ok(UploadedFile {
        field: part.field,
        filename: part.filename,
        encoding: part.encoding,
        mime: part.mime,
        bytes,
    })
}
