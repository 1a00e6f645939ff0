//! HTTP rendering of dispatch results: JSON body, cache validator headers, 304s.

use crate::collection::etag_matches;
use crate::error::EngineError;
use crate::router::Response as EngineResponse;
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

fn cache_headers(etag: Option<&str>, max_age: Option<u64>) -> Result<HeaderMap, EngineError> {
    let mut headers = HeaderMap::new();
    if let Some(tag) = etag {
        let value = HeaderValue::from_str(tag).map_err(|e| EngineError::Internal(format!("etag header: {}", e)))?;
        headers.insert(header::ETAG, value);
    }
    if let Some(seconds) = max_age {
        let value = HeaderValue::from_str(&format!("max-age={}", seconds))
            .map_err(|e| EngineError::Internal(format!("cache-control header: {}", e)))?;
        headers.insert(header::CACHE_CONTROL, value);
    }
    Ok(headers)
}

/// Whether the client's `If-None-Match` names the fresh validator. `*` matches anything.
pub fn not_modified(if_none_match: Option<&str>, etag: Option<&str>) -> bool {
    match (if_none_match, etag) {
        (Some(candidates), Some(fresh)) => candidates
            .split(',')
            .any(|c| c.trim() == "*" || etag_matches(c, fresh)),
        _ => false,
    }
}

/// Renders a dispatch result, answering 304 without a body when the client's
/// cached copy is still current.
pub fn render(response: EngineResponse, if_none_match: Option<&str>) -> Result<Response, EngineError> {
    let headers = cache_headers(response.etag.as_deref(), response.max_age)?;
    if not_modified(if_none_match, response.etag.as_deref()) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }
    let status = StatusCode::from_u16(response.status)
        .map_err(|_| EngineError::Internal(format!("invalid status {}", response.status)))?;
    Ok((status, headers, Json(response.body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tagged() -> EngineResponse {
        EngineResponse {
            status: 200,
            body: json!({ "items": [] }),
            etag: Some("W/\"abc\"".into()),
            max_age: Some(30),
        }
    }

    #[test]
    fn renders_cache_headers() {
        let res = render(tagged(), None).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::ETAG], "W/\"abc\"");
        assert_eq!(res.headers()[header::CACHE_CONTROL], "max-age=30");
    }

    #[test]
    fn matching_validator_yields_304() {
        let res = render(tagged(), Some("W/\"zzz\", W/\"abc\"")).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
        assert!(!not_modified(Some("W/\"abc\""), None));
        assert!(!not_modified(None, Some("W/\"abc\"")));
    }

    #[test]
    fn custom_status_is_kept() {
        let res = render(
            EngineResponse {
                status: 201,
                body: json!({ "id": 1 }),
                etag: None,
                max_age: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(render(EngineResponse { status: 1000, ..tagged() }, None).is_err());
    }
}
