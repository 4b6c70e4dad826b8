use super::*;
use crate::events::{Actor, factory};
use crate::realtime::Registration;
use crate::state::test_helpers;
use reqwest::StatusCode;
use serde_json::json;

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::routes::app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn join(state: &AppState, user_id: &str, plan_id: &str) -> tokio::sync::mpsc::Receiver<crate::protocol::Outbound> {
    let Registration { mut rx, .. } = state.server.register(user_id).unwrap();
    state.server.join_plan(user_id, plan_id);
    while rx.try_recv().is_ok() {}
    rx
}

// =============================================================================
// TARGET DECODING
// =============================================================================

#[test]
fn publish_target_shapes() {
    let plan: PublishTarget = serde_json::from_value(json!({"scope": "plan", "planId": "P1"})).unwrap();
    assert_eq!(plan, PublishTarget::Plan { plan_id: "P1".into() });

    let node: PublishTarget = serde_json::from_value(json!({"scope": "node", "nodeId": "N1", "planId": "P1"})).unwrap();
    assert_eq!(node, PublishTarget::Node { node_id: "N1".into(), plan_id: "P1".into() });

    let all: PublishTarget = serde_json::from_value(json!({"scope": "everyone"})).unwrap();
    assert_eq!(all, PublishTarget::Everyone);

    assert!(serde_json::from_value::<PublishTarget>(json!({"scope": "galaxy"})).is_err());
}

// =============================================================================
// HTTP
// =============================================================================

#[tokio::test]
async fn queries_require_bearer_token() {
    let base = serve(test_helpers::test_app_state()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/realtime/plans/P1/users")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("{base}/api/realtime/plans/P1/users"))
        .bearer_auth("expired")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("{base}/api/realtime/plans/P1/users"))
        .bearer_auth("down")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn queries_report_room_state() {
    let state = test_helpers::test_app_state();
    let _rx = join(&state, "alice", "P1");
    state.server.join_node("alice", "N1");
    state.server.typing_start("alice", "N1");
    let base = serve(state).await;
    let client = reqwest::Client::new();

    for (path, expected) in [
        ("plans/P1/users", vec!["alice"]),
        ("plans/P2/users", vec![]),
        ("nodes/N1/users", vec!["alice"]),
        ("nodes/N1/typing", vec!["alice"]),
    ] {
        let body: UsersResponse = client
            .get(format!("{base}/api/realtime/{path}"))
            .bearer_auth("bob")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.users, expected, "{path}");
    }
}

#[tokio::test]
async fn publish_to_plan_room_excludes_actor() {
    let state = test_helpers::test_app_state();
    let mut rx_alice = join(&state, "alice", "P1");
    let mut rx_bob = join(&state, "bob", "P1");
    while rx_alice.try_recv().is_ok() {}
    let base = serve(state).await;

    let event = factory::plan_deleted("P1", &Actor::new("alice"));
    let body: PublishResponse = reqwest::Client::new()
        .post(format!("{base}/api/realtime/publish"))
        .bearer_auth("workflow")
        .json(&json!({
            "target": {"scope": "plan", "planId": "P1"},
            "excludeUserId": "alice",
            "event": event,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body.delivered);
    let out = rx_bob.try_recv().unwrap();
    assert_eq!(out.kind(), "plan.deleted");
    assert!(rx_alice.try_recv().is_err());
}

#[tokio::test]
async fn publish_to_absent_user_is_not_delivered() {
    let state = test_helpers::test_app_state();
    let base = serve(state).await;

    let event = factory::collaborator_removed("P1", "carol", &Actor::new("alice"));
    let body: PublishResponse = reqwest::Client::new()
        .post(format!("{base}/api/realtime/publish"))
        .bearer_auth("workflow")
        .json(&json!({"target": {"scope": "user", "userId": "carol"}, "event": event}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, PublishResponse { delivered: false });
}

#[tokio::test]
async fn publish_without_server_is_not_delivered() {
    let state = test_helpers::test_app_state();
    state.notifier.clear_server();
    let base = serve(state).await;

    let event = factory::plan_deleted("P1", &Actor::new("alice"));
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/realtime/publish"))
        .bearer_auth("workflow")
        .json(&json!({"target": {"scope": "everyone"}, "event": event}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: PublishResponse = resp.json().await.unwrap();
    assert!(!body.delivered);
}

#[tokio::test]
async fn healthz_reports_connections() {
    let state = test_helpers::test_app_state();
    let _rx = join(&state, "alice", "P1");
    let base = serve(state).await;

    let body: serde_json::Value = reqwest::get(format!("{base}/healthz")).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({"status": "ok", "connections": 1, "typingTimeoutMs": 100}));
}
