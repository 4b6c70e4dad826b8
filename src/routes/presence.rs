//! Presence queries and the internal publish endpoint.
//!
//! Both go through the `Notifier`, so a missing or failing realtime server
//! shows up as an empty list or `delivered: false`, never as an HTTP error.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::events::Envelope;
use crate::routes::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsersResponse {
    pub users: Vec<String>,
}

/// `GET /api/realtime/plans/{plan_id}/users`
pub async fn plan_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(plan_id): Path<String>,
) -> Json<UsersResponse> {
    Json(UsersResponse { users: state.notifier.active_plan_users(&plan_id) })
}

/// `GET /api/realtime/nodes/{node_id}/users`
pub async fn node_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(node_id): Path<String>,
) -> Json<UsersResponse> {
    Json(UsersResponse { users: state.notifier.active_node_users(&node_id) })
}

/// `GET /api/realtime/nodes/{node_id}/typing`
pub async fn typing_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(node_id): Path<String>,
) -> Json<UsersResponse> {
    Json(UsersResponse { users: state.notifier.typing_users(&node_id) })
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Where a published envelope goes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PublishTarget {
    Plan { plan_id: String },
    Node { node_id: String, plan_id: String },
    Everyone,
    User { user_id: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
    pub target: PublishTarget,
    #[serde(default)]
    pub exclude_user_id: Option<String>,
    pub event: Envelope,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishResponse {
    pub delivered: bool,
}

/// `POST /api/realtime/publish`: fan out a pre-built envelope.
pub async fn publish(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PublishBody>,
) -> Json<PublishResponse> {
    let PublishBody { target, exclude_user_id, event } = body;
    let exclude = exclude_user_id.as_deref();
    info!(
        publisher = %auth.identity.user_id,
        actor = %event.actor_id(),
        kind = %event.kind(),
        target = ?target,
        "http: publish"
    );
    if let PublishTarget::Node { node_id, .. } = &target {
        if let Some(subject) = event.event.node_id().filter(|subject| *subject != node_id.as_str()) {
            warn!(%node_id, %subject, kind = %event.kind(), "http: publishing to a node room other than the event's node");
        }
    }

    let delivered = match &target {
        PublishTarget::Plan { plan_id } => state.notifier.notify_plan_room(plan_id, event, exclude),
        PublishTarget::Node { node_id, plan_id } => state.notifier.notify_node_room(node_id, plan_id, event, exclude),
        PublishTarget::Everyone => state.notifier.notify_everyone(event, exclude),
        PublishTarget::User { user_id } => state.notifier.send_to_user(user_id, event),
    };
    Json(PublishResponse { delivered })
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
