//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the presence socket, the authenticated presence
//! query and publish API, and a health check.

pub mod auth;
pub mod presence;
pub mod ws;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/realtime/plans/{plan_id}/users", get(presence::plan_users))
        .route("/api/realtime/nodes/{node_id}/users", get(presence::node_users))
        .route("/api/realtime/nodes/{node_id}/typing", get(presence::typing_users))
        .route("/api/realtime/publish", post(presence::publish))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.server.connection_count(),
        "typingTimeoutMs": u64::try_from(state.config.typing_timeout.as_millis()).unwrap_or(u64::MAX),
    }))
}
