//! WebSocket handler: authenticated presence session.
//!
//! DESIGN
//! ======
//! The upgrade is accepted before authentication so that a rejected
//! credential can be reported with a close code the client can act on:
//! `4001` means the token is dead and must not be retried, `1008` covers
//! every other authentication failure.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → verify token → register with the presence server
//! 2. `select!` loop: inbound text → decode → server intent;
//!    outbound channel → socket
//! 3. Channel closed by a newer connection → close `1000 superseded`;
//!    closed by server shutdown → close `1001 server shutting down`
//! 4. Close → unregister (leaves rooms, clears typing)

use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, Outbound, ProtocolError};
use crate::services::identity::{self, Identity, IdentityError};
use crate::state::AppState;

/// Credential is dead (expired or forged); do not reconnect with it.
pub const CLOSE_DEAD_CREDENTIAL: u16 = 4001;
/// Any other authentication failure.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = identity::extract_token(params.get("token").map(String::as_str), &headers);
    ws.on_upgrade(move |socket| run_ws(socket, state, token))
}

async fn authenticate(state: &AppState, token: Option<&str>) -> Result<Identity, IdentityError> {
    let token = token.ok_or(IdentityError::MissingToken)?;
    state.verifier.verify(token).await
}

/// Close code for a failed authentication.
#[must_use]
pub fn auth_close_code(err: &IdentityError) -> u16 {
    if err.is_dead_credential() { CLOSE_DEAD_CREDENTIAL } else { CLOSE_POLICY_VIOLATION }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, token: Option<String>) {
    let identity = match authenticate(&state, token.as_deref()).await {
        Ok(identity) => identity,
        Err(e) => {
            let code = auth_close_code(&e);
            warn!(error = %e, code, "ws: authentication failed");
            close(&mut socket, code, &e.to_string()).await;
            return;
        }
    };
    let user_id = identity.user_id;

    let registration = match state.server.register(&user_id) {
        Ok(r) => r,
        Err(e) => {
            warn!(%user_id, error = %e, "ws: registration refused");
            close(&mut socket, CLOSE_GOING_AWAY, "server shutting down").await;
            return;
        }
    };
    let conn_id = registration.conn_id;
    let mut rx = registration.rx;
    info!(%user_id, %conn_id, name = ?identity.name, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => process_inbound_text(&state, &user_id, conn_id, &text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            out = rx.recv() => {
                let Some(out) = out else {
                    if state.server.is_shutting_down() {
                        info!(%user_id, %conn_id, "ws: closing for server shutdown");
                        close(&mut socket, CLOSE_GOING_AWAY, "server shutting down").await;
                    } else {
                        info!(%user_id, %conn_id, "ws: superseded by newer connection");
                        close(&mut socket, CLOSE_NORMAL, "superseded").await;
                    }
                    break;
                };
                if send_outbound(&mut socket, &out).await.is_err() {
                    break;
                }
            }
        }
    }

    state.server.unregister(&user_id, conn_id);
    info!(%user_id, %conn_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode one inbound text message and apply it.
///
/// Malformed messages earn an `error` reply on the connection's own channel;
/// unknown types are logged and dropped.
fn process_inbound_text(state: &AppState, user_id: &str, conn_id: Uuid, text: &str) {
    match ClientMessage::decode(text) {
        Ok(msg) => {
            debug!(%user_id, kind = msg.kind(), "ws: recv");
            state.server.handle(user_id, conn_id, msg);
        }
        Err(ProtocolError::UnknownType(kind)) => {
            info!(%user_id, %kind, "ws: ignoring unknown message type");
        }
        Err(e) => {
            warn!(%user_id, error = %e, "ws: malformed inbound message");
            state.server.send_error(user_id, &e);
        }
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_outbound(socket: &mut WebSocket, out: &Outbound) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(out) {
        Ok(text) => text,
        Err(e) => {
            warn!(kind = out.kind(), error = %e, "ws: failed to serialize outbound message");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    let frame = CloseFrame { code, reason: Utf8Bytes::from(reason) };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
