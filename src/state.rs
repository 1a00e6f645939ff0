//! Shared application state for the resource routes.

use crate::config::EngineConfig;
use crate::router::Router;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct AppState {
    pub router: Arc<Router>,
    pub config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(router: Arc<Router>, config: EngineConfig) -> Self {
        AppState {
            router,
            config: Arc::new(config),
        }
    }
}
