use super::*;
use crate::protocol::PresenceMessage;
use crate::realtime::Registration;
use crate::state::test_helpers;
use futures::{SinkExt, StreamExt};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;

// =============================================================================
// CLOSE CODES
// =============================================================================

#[test]
fn dead_credentials_close_with_4001() {
    assert_eq!(auth_close_code(&IdentityError::Expired), CLOSE_DEAD_CREDENTIAL);
    assert_eq!(auth_close_code(&IdentityError::InvalidSignature), CLOSE_DEAD_CREDENTIAL);
}

#[test]
fn other_auth_failures_close_with_1008() {
    for err in [
        IdentityError::MissingToken,
        IdentityError::UnknownUser,
        IdentityError::Rejected("garbage".into()),
        IdentityError::Provider("timeout".into()),
    ] {
        assert_eq!(auth_close_code(&err), CLOSE_POLICY_VIOLATION, "{err}");
    }
}

#[tokio::test]
async fn authenticate_requires_a_token() {
    let state = test_helpers::test_app_state();
    assert_eq!(authenticate(&state, None).await.unwrap_err(), IdentityError::MissingToken);
    assert_eq!(authenticate(&state, Some("alice")).await.unwrap().user_id, "alice");
}

// =============================================================================
// INBOUND DISPATCH
// =============================================================================

async fn recv(rx: &mut tokio::sync::mpsc::Receiver<Outbound>) -> Outbound {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("receive timed out")
        .expect("channel closed unexpectedly")
}

fn connected(state: &AppState, user_id: &str) -> (Uuid, tokio::sync::mpsc::Receiver<Outbound>) {
    let Registration { conn_id, mut rx } = state.server.register(user_id).unwrap();
    assert_eq!(rx.try_recv().unwrap().kind(), "connection");
    (conn_id, rx)
}

#[tokio::test]
async fn valid_intent_is_applied() {
    let state = test_helpers::test_app_state();
    let (conn_id, mut rx) = connected(&state, "alice");

    process_inbound_text(&state, "alice", conn_id, r#"{"type":"join_plan","planId":"P1"}"#);

    assert_eq!(recv(&mut rx).await.kind(), "active_users");
    assert_eq!(state.notifier.active_plan_users("P1"), vec!["alice"]);
}

#[tokio::test]
async fn malformed_message_gets_error_reply() {
    let state = test_helpers::test_app_state();
    let (conn_id, mut rx) = connected(&state, "alice");

    process_inbound_text(&state, "alice", conn_id, r#"{"type":"join_plan"}"#);

    match recv(&mut rx).await.as_presence() {
        Some(PresenceMessage::Error { code, .. }) => assert_eq!(code, "E_MALFORMED"),
        other => panic!("expected error message, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_type_is_ignored_silently() {
    let state = test_helpers::test_app_state();
    let (conn_id, mut rx) = connected(&state, "alice");

    process_inbound_text(&state, "alice", conn_id, r#"{"type":"teleport"}"#);

    assert!(timeout(Duration::from_millis(80), rx.recv()).await.is_err());
}

// =============================================================================
// SOCKET
// =============================================================================

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::routes::app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

async fn next_frame(client: &mut Client) -> WsMessage {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("socket receive timed out")
            .expect("socket ended")
            .expect("socket error");
        if !matches!(msg, WsMessage::Ping(_) | WsMessage::Pong(_)) {
            return msg;
        }
    }
}

async fn next_json(client: &mut Client) -> serde_json::Value {
    match next_frame(client).await {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn expect_close(client: &mut Client) -> (u16, String) {
    match next_frame(client).await {
        WsMessage::Close(Some(frame)) => (u16::from(frame.code), frame.reason.as_str().to_string()),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_token_closes_with_dead_credential_code() {
    let url = serve(test_helpers::test_app_state()).await;
    let (mut client, _) = tokio_tungstenite::connect_async(format!("{url}?token=expired")).await.unwrap();
    let (code, _) = expect_close(&mut client).await;
    assert_eq!(code, CLOSE_DEAD_CREDENTIAL);
}

#[tokio::test]
async fn missing_token_closes_with_policy_code() {
    let state = test_helpers::test_app_state();
    let url = serve(state.clone()).await;
    let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let (code, _) = expect_close(&mut client).await;
    assert_eq!(code, CLOSE_POLICY_VIOLATION);
    assert_eq!(state.server.connection_count(), 0);
}

#[tokio::test]
async fn session_joins_plan_and_cleans_up_on_close() {
    let state = test_helpers::test_app_state();
    let url = serve(state.clone()).await;
    let (mut client, _) = tokio_tungstenite::connect_async(format!("{url}?token=alice")).await.unwrap();

    let ack = next_json(&mut client).await;
    assert_eq!(ack["type"], "connection");
    assert_eq!(ack["userId"], "alice");

    client
        .send(WsMessage::Text(r#"{"type":"join_plan","planId":"P1"}"#.into()))
        .await
        .unwrap();
    let snapshot = next_json(&mut client).await;
    assert_eq!(snapshot["type"], "active_users");
    assert_eq!(snapshot["users"], serde_json::json!(["alice"]));

    client.send(WsMessage::Text(r#"{"type":"ping"}"#.into())).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "pong");

    client.close(None).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while state.server.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection should be unregistered");
    assert!(state.server.active_plan_users("P1").is_empty());
}

#[tokio::test]
async fn second_connection_supersedes_first() {
    let state = test_helpers::test_app_state();
    let url = serve(state.clone()).await;

    let (mut first, _) = tokio_tungstenite::connect_async(format!("{url}?token=alice")).await.unwrap();
    assert_eq!(next_json(&mut first).await["type"], "connection");

    let (mut second, _) = tokio_tungstenite::connect_async(format!("{url}?token=alice")).await.unwrap();
    assert_eq!(next_json(&mut second).await["type"], "connection");

    let (code, reason) = expect_close(&mut first).await;
    assert_eq!(code, CLOSE_NORMAL);
    assert_eq!(reason, "superseded");
    assert!(state.server.is_connected("alice"));
}

#[tokio::test]
async fn shutdown_closes_sessions_with_going_away() {
    let state = test_helpers::test_app_state();
    let url = serve(state.clone()).await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("{url}?token=alice")).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "connection");

    state.server.shutdown();

    let (code, reason) = expect_close(&mut client).await;
    assert_eq!(code, CLOSE_GOING_AWAY);
    assert_eq!(reason, "server shutting down");
}

#[tokio::test]
async fn connect_after_shutdown_closes_with_going_away() {
    let state = test_helpers::test_app_state();
    let url = serve(state.clone()).await;
    state.server.shutdown();

    let (mut client, _) = tokio_tungstenite::connect_async(format!("{url}?token=alice")).await.unwrap();
    let (code, reason) = expect_close(&mut client).await;
    assert_eq!(code, CLOSE_GOING_AWAY);
    assert_eq!(reason, "server shutting down");
}
