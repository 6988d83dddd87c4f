//! Health Server
//!
//! Keep-alive endpoints for the hosting platform:
//! - `GET /` bot status and table sizes
//! - `GET /ping` liveness with timestamp
//! - `GET /healthz` bare 200

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::BotEngine;
use crate::persona::{self, BOT_DISPLAY_NAME};

/// Build the health router
pub fn health_router(engine: Arc<BotEngine>) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/ping", get(ping_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn status_handler(State(engine): State<Arc<BotEngine>>) -> Json<Value> {
    let stats = engine.store().stats();
    Json(json!({
        "status": "alive",
        "bot": BOT_DISPLAY_NAME,
        "username": format!("@{}", engine.identity().username),
        "uptime": persona::format_uptime(engine.uptime_secs()),
        "users": stats.users,
        "verified": stats.verified,
        "conversations": stats.conversations,
    }))
}

async fn ping_handler() -> Json<Value> {
    Json(json!({
        "pong": true,
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

async fn healthz_handler() -> StatusCode {
    StatusCode::OK
}

/// Serve the health router until the process exits
pub async fn serve(engine: Arc<BotEngine>, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health server listening on {}", addr);

    axum::serve(listener, health_router(engine)).await?;
    Ok(())
}
