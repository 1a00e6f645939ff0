//! Transport adapter: turns an HTTP request into a dispatch on the engine router.

use crate::error::EngineError;
use crate::request::{Method, RequestContext, UploadPart, PROPS_PARAM};
use crate::response::render;
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::Instrument;
use uuid::Uuid;

/// Fallback handler for every method and path under the base path.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "resource",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    handle(state, request)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn handle(state: AppState, request: Request) -> Result<Response, EngineError> {
    let method = Method::try_from(request.method())?;
    let uri = request.uri().clone();
    let path = state
        .config
        .strip_base(uri.path())
        .ok_or_else(|| EngineError::NotFound(uri.path().to_string()))?
        .to_string();
    let query = parse_query(&uri)?;
    let if_none_match = header_str(request.headers(), header::IF_NONE_MATCH);

    let mut ctx = RequestContext::new(method, path.clone());
    ctx.set_props(query.get(PROPS_PARAM).map(|p| split_props(p)).unwrap_or_default());
    ctx.set_query(query);

    if method.carries_body() {
        let content_type = header_str(request.headers(), header::CONTENT_TYPE).unwrap_or_default();
        if content_type.starts_with("multipart/form-data") {
            // Uploads are checked against the route schema while they stream in.
            ctx.set_schema(state.router.schema_for(&path).cloned());
            read_multipart(&mut ctx, request).await?;
        } else {
            read_json(&mut ctx, request, state.config.max_body_bytes).await?;
        }
    }

    let response = state.router.handle(ctx).await?;
    render(response, if_none_match.as_deref())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn parse_query(uri: &Uri) -> Result<BTreeMap<String, String>, EngineError> {
    if uri.query().is_none() {
        return Ok(BTreeMap::new());
    }
    Query::<BTreeMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q)
        .map_err(|e| EngineError::BadRequest(e.body_text()))
}

/// `props=name, address.city` yields `["name", "address.city"]`.
pub fn split_props(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

async fn read_json(ctx: &mut RequestContext, request: Request, limit: usize) -> Result<(), EngineError> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| EngineError::BadRequest(format!("request body: {}", e)))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let body: Value =
        serde_json::from_slice(&bytes).map_err(|e| EngineError::BadRequest(format!("invalid json body: {}", e)))?;
    ctx.set_body(Some(body));
    Ok(())
}

/// Drains every part before dispatch: file parts go through the upload checks,
/// text parts become body fields.
async fn read_multipart(ctx: &mut RequestContext, request: Request) -> Result<(), EngineError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| EngineError::BadRequest(e.body_text()))?;
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| EngineError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            let part = UploadPart {
                field: name,
                filename: field.file_name().map(str::to_string),
                encoding: header_str(field.headers(), header::HeaderName::from_static("content-transfer-encoding")),
                mime: field.content_type().map(str::to_string),
            };
            ctx.accept_upload(part, field).await;
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| EngineError::BadRequest(e.body_text()))?;
            fields.insert(name, Value::String(text));
        }
    }
    if !fields.is_empty() {
        ctx.set_body(Some(Value::Object(fields)));
    }
    Ok(())
}
