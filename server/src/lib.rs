//! Shelf Server - a Todo service over a synchronized collection cache.
//!
//! This server exposes one [`SyncedCollection`](shelf_engine::SyncedCollection)
//! of todos over HTTP and WebSocket. Every change of the cache's observable
//! state is pushed to connected WebSocket clients.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod snapshot;
pub mod todos;
pub mod websocket;

use crate::todos::TodoService;
use crate::websocket::ClientManager;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub todos: Arc<TodoService>,
    pub clients: Arc<ClientManager>,
    pub config: Arc<config::Config>,
}

/// Build the application router with its middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
