//! HTTP/WebSocket API for the tournament server.
//!
//! A single WebSocket route carries the entire protocol; there is no REST
//! surface because the core exposes no resource other than the one running
//! tournament.

pub mod websocket;

use axum::{
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use poker_core::Lobby;

pub fn create_router(lobby: Arc<Lobby>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(lobby)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
