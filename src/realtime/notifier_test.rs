use super::*;
use crate::events::{Actor, NodeStatus, factory};
use crate::protocol::Outbound;
use crate::realtime::server::Registration;
use std::time::Duration;
use tokio::sync::mpsc;

fn live_notifier() -> (Notifier, CollabServer) {
    let server = CollabServer::new(Duration::from_secs(5), 16);
    let notifier = Notifier::new();
    notifier.set_server(server.clone());
    (notifier, server)
}

fn connect(server: &CollabServer, user_id: &str) -> mpsc::Receiver<Outbound> {
    let Registration { mut rx, .. } = server.register(user_id).unwrap();
    assert_eq!(rx.try_recv().unwrap().kind(), "connection");
    rx
}

fn status_change() -> Envelope {
    factory::node_status_changed(
        "P1",
        "N2",
        NodeStatus::NotStarted,
        NodeStatus::InProgress,
        &Actor::new("A").with_name("Ada"),
    )
}

// =============================================================================
// UNAVAILABLE SERVER
// =============================================================================

#[test]
fn calls_before_set_server_return_false_or_empty() {
    let notifier = Notifier::new();
    assert!(!notifier.is_available());
    assert!(notifier.server().is_none());

    assert!(!notifier.notify_plan_room("P1", status_change(), None));
    assert!(!notifier.notify_node_room("N2", "P1", status_change(), Some("A")));
    assert!(!notifier.notify_everyone(status_change(), None));
    assert!(!notifier.send_to_user("A", status_change()));

    assert!(notifier.active_plan_users("P1").is_empty());
    assert!(notifier.active_node_users("N2").is_empty());
    assert!(notifier.typing_users("N2").is_empty());
}

#[tokio::test]
async fn clear_server_makes_facade_unavailable_again() {
    let (notifier, _server) = live_notifier();
    assert!(notifier.is_available());
    notifier.clear_server();
    assert!(!notifier.is_available());
    assert!(!notifier.notify_everyone(status_change(), None));
}

#[tokio::test]
async fn broadcast_after_shutdown_returns_false() {
    let (notifier, server) = live_notifier();
    server.shutdown();
    assert!(!notifier.notify_plan_room("P1", status_change(), None));
    assert!(!notifier.notify_everyone(status_change(), None));
}

// =============================================================================
// DELIVERY
// =============================================================================

#[tokio::test]
async fn status_change_reaches_plan_room_except_excluded() {
    let (notifier, server) = live_notifier();
    let mut rx_a = connect(&server, "A");
    let mut rx_b = connect(&server, "B");
    let mut rx_c = connect(&server, "C");
    for user in ["A", "B", "C"] {
        server.join_plan(user, "P1");
    }
    while rx_a.try_recv().is_ok() {}
    while rx_b.try_recv().is_ok() {}
    while rx_c.try_recv().is_ok() {}

    assert!(notifier.notify_plan_room("P1", status_change(), Some("A")));

    assert!(rx_a.try_recv().is_err());
    for rx in [&mut rx_b, &mut rx_c] {
        let out = rx.try_recv().unwrap();
        let env = out.as_event().unwrap();
        assert_eq!(env.kind(), EventKind::NodeStatusChanged);
        assert_eq!(env.plan_id(), "P1");
    }
}

#[tokio::test]
async fn empty_room_still_counts_as_sent() {
    let (notifier, _server) = live_notifier();
    assert!(notifier.notify_plan_room("P9", status_change(), None));
    assert!(notifier.notify_node_room("N9", "P9", status_change(), None));
}

#[tokio::test]
async fn send_to_user_handles_missing_and_present_users() {
    let (notifier, server) = live_notifier();
    assert!(!notifier.send_to_user("ghost", status_change()));

    let mut rx = connect(&server, "B");
    assert!(notifier.send_to_user("B", status_change()));
    assert_eq!(rx.try_recv().unwrap().kind(), "node.status_changed");

    drop(rx);
    assert!(!notifier.send_to_user("B", status_change()));
}

#[tokio::test]
async fn query_passthroughs_reflect_server_state() {
    let (notifier, server) = live_notifier();
    let _rx = connect(&server, "A");
    server.join_plan("A", "P1");
    server.join_node("A", "N1");
    server.typing_start("A", "N1");

    assert_eq!(notifier.active_plan_users("P1"), vec!["A"]);
    assert_eq!(notifier.active_node_users("N1"), vec!["A"]);
    assert_eq!(notifier.typing_users("N1"), vec!["A"]);
    assert!(notifier.typing_users("N2").is_empty());
}
