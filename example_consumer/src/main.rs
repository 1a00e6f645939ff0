//! Example consumer: a small book catalogue served by resource-engine.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Then try `curl 'http://127.0.0.1:3000/books/1?props=title,author.name'`.

use resource_engine::collection::Collection;
use resource_engine::router::{Output, Route, RouterBuilder};
use resource_engine::{
    common_routes, init_tracing, load_from_env, resolve_links, resource_routes, AppState, EngineError,
    Link, Method, PropPath, RequestContext, TracingListener,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

fn books() -> Vec<Value> {
    vec![
        json!({ "id": 1, "title": "Dune", "year": 1965, "author": 10 }),
        json!({ "id": 2, "title": "Solaris", "year": 1961, "author": 11 }),
    ]
}

fn authors() -> Vec<Value> {
    vec![
        json!({ "id": 10, "name": "Frank Herbert", "born": 1920 }),
        json!({ "id": 11, "name": "Stanislaw Lem", "born": 1921 }),
    ]
}

fn find(list: Vec<Value>, id: &Value) -> Result<Value, EngineError> {
    list.into_iter()
        .find(|item| item.get("id") == Some(id))
        .ok_or_else(|| EngineError::NotFound(format!("id {}", id)))
}

async fn list_books(_ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let items = books()
        .into_iter()
        .map(|b| Link::new(format!("/books/{}", b["id"])).with_data(json_map(json!({ "title": b["title"] }))).to_value())
        .collect();
    Ok(Output::represent(Collection::new(items).id("books").expires(30)))
}

/// Core fields of a book; the author arrives as a link resolved on demand.
async fn book_core(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let id = ctx.param("id").cloned().unwrap_or(Value::Null);
    let book = find(books(), &id)?;
    let author = Link::new(format!("/authors/{}", book["author"])).to_value();
    let value = json!({ "id": book["id"], "title": book["title"], "year": book["year"], "author": author });
    let conn = ctx.connection()?;
    let resolved = resolve_links(value, PropPath::parse_all(ctx.props()), conn.as_ref()).await?;
    Ok(Output::Value(resolved))
}

async fn book_stats(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let id = ctx.param("id").cloned().unwrap_or(Value::Null);
    Ok(Output::Value(json!({ "stats": { "loans": id.as_i64().unwrap_or(0) * 7 } })))
}

async fn read_author(ctx: Arc<RequestContext>) -> Result<Output, EngineError> {
    let id = ctx.param("id").cloned().unwrap_or(Value::Null);
    Ok(Output::Value(find(authors(), &id)?))
}

fn json_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env()?;
    init_tracing(&config);

    let router = RouterBuilder::new()
        .listener(Arc::new(TracingListener))
        .memoize_gets(config.memoize_gets)
        .route(
            Route::new("/books", json!({
                "type": "object",
                "properties": { "items": { "type": "array", "items": { "type": "object" } } }
            }))?
            .get(list_books),
        )
        .route(
            Route::new("/books/:id", json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "title": { "type": "string" },
                    "year": { "type": "integer" },
                    "author": { "type": "object", "properties": { "name": { "type": "string" } } },
                    "stats": { "type": "object", "properties": { "loans": { "type": "integer" } } }
                },
                "required": ["id", "title"]
            }))?
            .on_props(Method::Get, &["id", "title", "year", "author"], book_core)
            .on_props(Method::Get, &["stats"], book_stats),
        )
        .route(
            Route::new("/authors/:id", json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string" },
                    "born": { "type": "integer" }
                }
            }))?
            .get(read_author),
        )
        .build();

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(router, config);
    let app = common_routes().merge(resource_routes(state));
    let listener = TcpListener::bind(&bind_addr).await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
