//! Resource routes: every method and path falls through to the engine router.

use crate::handlers::resource::dispatch;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub fn resource_routes(state: AppState) -> Router {
    let limit = state.config.max_body_bytes;
    Router::new()
        .fallback(dispatch)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(limit)),
        )
        .with_state(state)
}
