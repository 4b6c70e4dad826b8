use super::*;
use time::format_description::well_known::Rfc3339;

fn actor() -> Actor {
    Actor::new("u-1").with_name("Ada")
}

fn plan() -> Plan {
    Plan {
        id: "P1".into(),
        title: "Launch".into(),
        description: Some("Q3 launch plan".into()),
        status: PlanStatus::Active,
        owner_id: "u-1".into(),
    }
}

fn node(id: &str, parent: Option<&str>, order_index: i32) -> PlanNode {
    PlanNode {
        id: id.into(),
        plan_id: "P1".into(),
        parent_id: parent.map(str::to_string),
        node_type: NodeType::Task,
        title: format!("task {id}"),
        description: None,
        status: NodeStatus::NotStarted,
        order_index,
    }
}

fn decision(status: DecisionStatus) -> Decision {
    Decision {
        id: "D1".into(),
        plan_id: "P1".into(),
        node_id: Some("N2".into()),
        title: "Pick a database".into(),
        context: None,
        status,
        outcome: None,
    }
}

/// One envelope of every kind, all owned by plan P1.
fn every_envelope() -> Vec<Envelope> {
    let a = actor();
    let comment = Comment {
        id: "C1".into(),
        plan_id: "P1".into(),
        node_id: "N2".into(),
        user_id: "u-1".into(),
        content: "looks good".into(),
    };
    let log = LogEntry {
        id: "L1".into(),
        plan_id: "P1".into(),
        node_id: "N2".into(),
        user_id: "u-1".into(),
        content: "started work".into(),
        log_type: "progress".into(),
    };
    let label = Label { id: "lb1".into(), name: "urgent".into(), color: None };
    let collaborator =
        Collaborator { plan_id: "P1".into(), user_id: "u-9".into(), user_name: None, role: CollaboratorRole::Editor };
    let assignee = Actor::new("u-9");

    vec![
        plan_created(&plan(), &a),
        plan_updated(&plan(), &["title"], &a),
        plan_deleted("P1", &a),
        plan_status_changed("P1", PlanStatus::Draft, PlanStatus::Active, &a),
        node_created(&node("N2", Some("N1"), 0), &a),
        node_updated(&node("N2", Some("N1"), 0), &[], &a),
        node_deleted(&node("N2", Some("N1"), 0), &a),
        node_moved(&node("N2", Some("N3"), 1), Some("N1"), 0, &a),
        node_status_changed("P1", "N2", NodeStatus::NotStarted, NodeStatus::InProgress, &a),
        user_assigned("P1", "N2", &assignee, &a),
        user_unassigned("P1", "N2", &assignee, &a),
        comment_added(&comment, &a),
        comment_updated(&comment, &a),
        comment_deleted("P1", "N2", "C1", &a),
        log_added(&log, &a),
        label_added("P1", "N2", &label, &a),
        label_removed("P1", "N2", &label, &a),
        decision_requested(&decision(DecisionStatus::Pending), &a),
        decision_resolved(&decision(DecisionStatus::Decided), &a),
        collaborator_added(&collaborator, &a),
        collaborator_removed("P1", "u-9", &a),
        collaborator_role_changed("P1", "u-9", CollaboratorRole::Editor, CollaboratorRole::Admin, &a),
    ]
}

#[test]
fn factories_cover_every_kind_once() {
    let kinds: Vec<EventKind> = every_envelope().iter().map(Envelope::kind).collect();
    assert_eq!(kinds, EventKind::ALL.to_vec());
}

#[test]
fn every_envelope_routes_to_owning_plan() {
    for env in every_envelope() {
        assert_eq!(env.plan_id(), "P1", "{} routed to wrong plan", env.kind());
        assert_eq!(env.metadata.user_id, "u-1");
        assert_eq!(env.metadata.user_name.as_deref(), Some("Ada"));
        assert_eq!(env.metadata.version, SCHEMA_VERSION);
    }
}

#[test]
fn every_envelope_serializes_type_and_iso_timestamp() {
    for env in every_envelope() {
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], env.kind().as_str());
        let ts = value["metadata"]["timestamp"].as_str().unwrap();
        assert!(time::OffsetDateTime::parse(ts, &Rfc3339).is_ok(), "bad timestamp {ts}");
        assert_eq!(value["metadata"]["planId"], "P1");
    }
}

#[test]
fn node_status_change_carries_both_statuses() {
    let env = node_status_changed("P1", "N2", NodeStatus::NotStarted, NodeStatus::InProgress, &actor());
    let value = serde_json::to_value(&env).unwrap();
    assert_eq!(value["type"], "node.status_changed");
    assert_eq!(value["payload"]["nodeId"], "N2");
    assert_eq!(value["payload"]["oldStatus"], "not_started");
    assert_eq!(value["payload"]["newStatus"], "in_progress");
}

#[test]
fn node_moved_carries_before_and_after_placement() {
    let moved = node("N2", Some("N3"), 5);
    let env = node_moved(&moved, Some("N1"), 2, &actor());
    let PlanEvent::NodeMoved(payload) = env.event else {
        panic!("expected node.moved");
    };
    assert_eq!(payload.old_parent_id.as_deref(), Some("N1"));
    assert_eq!(payload.new_parent_id.as_deref(), Some("N3"));
    assert_eq!(payload.old_order_index, 2);
    assert_eq!(payload.new_order_index, 5);
}

#[test]
fn node_moved_to_root_has_null_new_parent() {
    let env = node_moved(&node("N2", None, 0), Some("N1"), 3, &actor());
    let value = serde_json::to_value(&env).unwrap();
    assert!(value["payload"]["newParentId"].is_null());
    assert_eq!(value["payload"]["oldParentId"], "N1");
}

#[test]
fn anonymous_actor_degrades_to_null_name() {
    let env = plan_deleted("P1", &Actor::new("u-x"));
    assert_eq!(env.metadata.user_name, None);
    let value = serde_json::to_value(&env).unwrap();
    assert!(value["metadata"]["userName"].is_null());
}

#[test]
fn assignment_payload_names_the_assignee() {
    let assignee = Actor::new("u-9").with_name("Grace");
    let env = user_assigned("P1", "N2", &assignee, &actor());
    let value = serde_json::to_value(&env).unwrap();
    assert_eq!(value["payload"]["assigneeId"], "u-9");
    assert_eq!(value["payload"]["assigneeName"], "Grace");
    assert_eq!(value["metadata"]["userId"], "u-1");
}

#[test]
fn updated_events_list_changed_fields() {
    let env = plan_updated(&plan(), &["title", "description"], &actor());
    let PlanEvent::PlanUpdated(payload) = env.event else {
        panic!("expected plan.updated");
    };
    assert_eq!(payload.changed_fields, vec!["title".to_string(), "description".to_string()]);
}

#[test]
fn envelope_round_trips_through_json() {
    let env = collaborator_role_changed("P1", "u-9", CollaboratorRole::Viewer, CollaboratorRole::Owner, &actor());
    let json = serde_json::to_string(&env).unwrap();
    let restored: Envelope = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, env);
}
