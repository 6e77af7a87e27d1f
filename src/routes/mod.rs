// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::monitor::Monitor;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) monitor: Arc<Monitor>,
}

pub fn app(monitor: Arc<Monitor>) -> Router {
    let state = AppState { monitor };
    Router::new()
        .route("/", get(|| async { "netpulse: network traffic monitor" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/network/realtime", get(http::realtime_handler)) // GET /api/network/realtime
        .route("/api/network/hourly", get(http::hourly_handler)) // GET /api/network/hourly
        .route("/api/network/daily", get(http::daily_handler)) // GET /api/network/daily
        .route("/ws/network/realtime", get(ws::ws_realtime)) // WS /ws/network/realtime
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
