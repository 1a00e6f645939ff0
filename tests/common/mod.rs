//! Shared fixtures: a small user directory served by the engine.

#![allow(dead_code)]

use resource_engine::collection::Collection;
use resource_engine::connection::GetOptions;
use resource_engine::router::{Output, RecordingListener, Route, RouterBuilder};
use resource_engine::{EngineError, RequestContext, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn user_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" },
            "age": { "type": "integer" },
            "email": {
                "type": "string",
                "errors": { "1001": { "name": "EMAIL_TAKEN", "message": "email already registered" } }
            }
        },
        "required": ["id", "name"]
    })
}

pub fn list_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": { "name": { "type": "string" }, "age": { "type": "integer" } }
                }
            }
        }
    })
}

pub fn avatar_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "avatar": { "type": "file", "maxSize": 4, "mimes": ["image/*"] }
        }
    })
}

async fn read_user(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let id = ctx.param("id").cloned().unwrap_or(Value::Null);
    Ok(Output::Value(json!({ "id": id, "name": "Ann", "age": 30 })))
}

async fn create_user(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let body = ctx.body().cloned().unwrap_or(Value::Null);
    if body.get("email").and_then(Value::as_str) == Some("taken@example.com") {
        ctx.add_error("email", 1001);
        return Ok(Output::Value(json!({})));
    }
    Ok(Output::respond(201, json!({ "created": body })))
}

async fn list_users(_ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let items = vec![
        json!({ "$id": "u1", "name": "Ann", "age": 30 }),
        json!({ "$id": "u2", "name": "Bo", "age": 41 }),
    ];
    Ok(Output::represent(
        Collection::with_offset(items, 0, 10).id("users").expires(60).total(2),
    ))
}

async fn read_friend(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let conn = ctx.connection()?;
    let friend = conn.get("/users/7", GetOptions::props(&["name"])).await?;
    Ok(Output::Value(json!({ "friend": friend })))
}

async fn upload_avatar(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let file = ctx.upload("avatar")?;
    let title = ctx.body().and_then(|b| b.get("title")).cloned().unwrap_or(Value::Null);
    Ok(Output::respond(
        201,
        json!({ "size": file.len(), "mime": file.mime, "title": title }),
    ))
}

pub fn router_with(listener: Option<Arc<RecordingListener>>) -> Arc<Router> {
    let mut builder = RouterBuilder::new()
        .route(Route::new("/users", list_schema()).unwrap().get(list_users))
        .route(
            Route::new("/users/:id", user_schema())
                .unwrap()
                .get(read_user),
        )
        .route(Route::new("/members", user_schema()).unwrap().post(create_user))
        .route(
            Route::new("/pair", json!({
                "type": "object",
                "properties": { "a": { "type": "integer" }, "b": { "type": "integer" } }
            }))
            .unwrap()
            .on_props(resource_engine::Method::Get, &["a"], |_ctx| async { Ok(Output::Value(json!({ "a": 1 }))) })
            .on_props(resource_engine::Method::Get, &["b"], |_ctx| async { Ok(Output::Value(json!({ "b": 2 }))) }),
        )
        .route(
            Route::new("/clash", json!({
                "type": "object",
                "properties": { "a": { "type": "integer" }, "b": { "type": "integer" } }
            }))
            .unwrap()
            .on_props(resource_engine::Method::Get, &["a"], |_ctx| async { Ok(Output::Value(json!({ "a": 1 }))) })
            .on_props(resource_engine::Method::Get, &["a", "b"], |_ctx| async {
                Ok(Output::Value(json!({ "a": 10, "b": 2 })))
            }),
        )
        .route(
            Route::new("/empty/:id", user_schema())
                .unwrap()
                .get(|_ctx| async { Ok(Output::Value(Value::Null)) })
                .delete(|_ctx| async { Ok(Output::Value(Value::Null)) }),
        )
        .route(
            Route::new("/friends/:id", json!({
                "type": "object",
                "properties": { "friend": { "type": "object" } }
            }))
            .unwrap()
            .get(read_friend),
        )
        .route(Route::new("/avatars", avatar_schema()).unwrap().post(upload_avatar))
        .route(
            Route::new("/broken", user_schema())
                .unwrap()
                .get(|_ctx| async { Ok(Output::Value(json!({ "id": "seven", "name": "Ann" }))) }),
        );
    if let Some(listener) = listener {
        builder = builder.listener(listener);
    }
    builder.build()
}

pub fn router() -> Arc<Router> {
    router_with(None)
}
