//! Lifecycle events emitted while dispatching a request.

use crate::error::EngineError;
use crate::request::Method;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A handler selected for the request is about to run.
    HandlerInvoked {
        method: Method,
        path: String,
        pattern: String,
        props: Vec<String>,
    },
    Success {
        method: Method,
        path: String,
        schema: Value,
        elapsed: Duration,
    },
    /// `schema` is `None` when no route matched.
    Error {
        method: Method,
        path: String,
        schema: Option<Value>,
        error: EngineError,
        elapsed: Duration,
    },
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Writes every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::HandlerInvoked {
                method,
                path,
                pattern,
                props,
            } => tracing::debug!(%method, %path, %pattern, ?props, "handler invoked"),
            EngineEvent::Success { method, path, elapsed, .. } => {
                tracing::info!(%method, %path, elapsed_ms = elapsed.as_millis() as u64, "request handled")
            }
            EngineEvent::Error {
                method,
                path,
                error,
                elapsed,
                ..
            } => {
                let status = error.status().as_u16();
                if status >= 500 {
                    tracing::error!(%method, %path, status, %error, elapsed_ms = elapsed.as_millis() as u64, "request failed")
                } else {
                    tracing::warn!(%method, %path, status, %error, elapsed_ms = elapsed.as_millis() as u64, "request rejected")
                }
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
