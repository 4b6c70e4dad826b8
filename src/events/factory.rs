//! Envelope factories, one per event kind.
//!
//! All factories are pure and infallible. The owning plan id is always taken
//! from the domain object (or passed explicitly for id-only events) and ends
//! up in `metadata.planId`.

use super::types::*;

// =============================================================================
// PLAN LIFECYCLE
// =============================================================================

#[must_use]
pub fn plan_created(plan: &Plan, actor: &Actor) -> Envelope {
    Envelope::new(PlanEvent::PlanCreated(PlanPayload { plan: plan.clone() }), actor, &plan.id)
}

#[must_use]
pub fn plan_updated(plan: &Plan, changed_fields: &[&str], actor: &Actor) -> Envelope {
    let payload = PlanUpdatedPayload { plan: plan.clone(), changed_fields: to_owned_fields(changed_fields) };
    Envelope::new(PlanEvent::PlanUpdated(payload), actor, &plan.id)
}

#[must_use]
pub fn plan_deleted(plan_id: &str, actor: &Actor) -> Envelope {
    let payload = PlanDeletedPayload { plan_id: plan_id.to_string() };
    Envelope::new(PlanEvent::PlanDeleted(payload), actor, plan_id)
}

#[must_use]
pub fn plan_status_changed(plan_id: &str, old_status: PlanStatus, new_status: PlanStatus, actor: &Actor) -> Envelope {
    let payload = PlanStatusChangedPayload { plan_id: plan_id.to_string(), old_status, new_status };
    Envelope::new(PlanEvent::PlanStatusChanged(payload), actor, plan_id)
}

// =============================================================================
// NODE LIFECYCLE
// =============================================================================

#[must_use]
pub fn node_created(node: &PlanNode, actor: &Actor) -> Envelope {
    Envelope::new(PlanEvent::NodeCreated(NodePayload { node: node.clone() }), actor, &node.plan_id)
}

#[must_use]
pub fn node_updated(node: &PlanNode, changed_fields: &[&str], actor: &Actor) -> Envelope {
    let payload = NodeUpdatedPayload { node: node.clone(), changed_fields: to_owned_fields(changed_fields) };
    Envelope::new(PlanEvent::NodeUpdated(payload), actor, &node.plan_id)
}

/// `node` is the snapshot taken just before deletion.
#[must_use]
pub fn node_deleted(node: &PlanNode, actor: &Actor) -> Envelope {
    let payload = NodeDeletedPayload { node_id: node.id.clone(), parent_id: node.parent_id.clone() };
    Envelope::new(PlanEvent::NodeDeleted(payload), actor, &node.plan_id)
}

/// `node` is the snapshot after the move; the previous placement is passed
/// separately.
#[must_use]
pub fn node_moved(node: &PlanNode, old_parent_id: Option<&str>, old_order_index: i32, actor: &Actor) -> Envelope {
    let payload = NodeMovedPayload {
        node_id: node.id.clone(),
        old_parent_id: old_parent_id.map(str::to_string),
        new_parent_id: node.parent_id.clone(),
        old_order_index,
        new_order_index: node.order_index,
    };
    Envelope::new(PlanEvent::NodeMoved(payload), actor, &node.plan_id)
}

#[must_use]
pub fn node_status_changed(
    plan_id: &str,
    node_id: &str,
    old_status: NodeStatus,
    new_status: NodeStatus,
    actor: &Actor,
) -> Envelope {
    let payload = NodeStatusChangedPayload { node_id: node_id.to_string(), old_status, new_status };
    Envelope::new(PlanEvent::NodeStatusChanged(payload), actor, plan_id)
}

// =============================================================================
// COLLABORATION ACTIVITY
// =============================================================================

#[must_use]
pub fn user_assigned(plan_id: &str, node_id: &str, assignee: &Actor, actor: &Actor) -> Envelope {
    Envelope::new(PlanEvent::UserAssigned(assignment(node_id, assignee)), actor, plan_id)
}

#[must_use]
pub fn user_unassigned(plan_id: &str, node_id: &str, assignee: &Actor, actor: &Actor) -> Envelope {
    Envelope::new(PlanEvent::UserUnassigned(assignment(node_id, assignee)), actor, plan_id)
}

#[must_use]
pub fn comment_added(comment: &Comment, actor: &Actor) -> Envelope {
    let payload = CommentPayload { node_id: comment.node_id.clone(), comment: comment.clone() };
    Envelope::new(PlanEvent::CommentAdded(payload), actor, &comment.plan_id)
}

#[must_use]
pub fn comment_updated(comment: &Comment, actor: &Actor) -> Envelope {
    let payload = CommentPayload { node_id: comment.node_id.clone(), comment: comment.clone() };
    Envelope::new(PlanEvent::CommentUpdated(payload), actor, &comment.plan_id)
}

#[must_use]
pub fn comment_deleted(plan_id: &str, node_id: &str, comment_id: &str, actor: &Actor) -> Envelope {
    let payload = CommentDeletedPayload { node_id: node_id.to_string(), comment_id: comment_id.to_string() };
    Envelope::new(PlanEvent::CommentDeleted(payload), actor, plan_id)
}

#[must_use]
pub fn log_added(log: &LogEntry, actor: &Actor) -> Envelope {
    let payload = LogPayload { node_id: log.node_id.clone(), log: log.clone() };
    Envelope::new(PlanEvent::LogAdded(payload), actor, &log.plan_id)
}

#[must_use]
pub fn label_added(plan_id: &str, node_id: &str, label: &Label, actor: &Actor) -> Envelope {
    let payload = LabelPayload { node_id: node_id.to_string(), label: label.clone() };
    Envelope::new(PlanEvent::LabelAdded(payload), actor, plan_id)
}

#[must_use]
pub fn label_removed(plan_id: &str, node_id: &str, label: &Label, actor: &Actor) -> Envelope {
    let payload = LabelPayload { node_id: node_id.to_string(), label: label.clone() };
    Envelope::new(PlanEvent::LabelRemoved(payload), actor, plan_id)
}

#[must_use]
pub fn decision_requested(decision: &Decision, actor: &Actor) -> Envelope {
    let payload = DecisionPayload { decision: decision.clone() };
    Envelope::new(PlanEvent::DecisionRequested(payload), actor, &decision.plan_id)
}

#[must_use]
pub fn decision_resolved(decision: &Decision, actor: &Actor) -> Envelope {
    let payload = DecisionPayload { decision: decision.clone() };
    Envelope::new(PlanEvent::DecisionResolved(payload), actor, &decision.plan_id)
}

// =============================================================================
// COLLABORATOR ROSTER
// =============================================================================

#[must_use]
pub fn collaborator_added(collaborator: &Collaborator, actor: &Actor) -> Envelope {
    let payload = CollaboratorPayload { collaborator: collaborator.clone() };
    Envelope::new(PlanEvent::CollaboratorAdded(payload), actor, &collaborator.plan_id)
}

#[must_use]
pub fn collaborator_removed(plan_id: &str, user_id: &str, actor: &Actor) -> Envelope {
    let payload = CollaboratorRemovedPayload { user_id: user_id.to_string() };
    Envelope::new(PlanEvent::CollaboratorRemoved(payload), actor, plan_id)
}

#[must_use]
pub fn collaborator_role_changed(
    plan_id: &str,
    user_id: &str,
    old_role: CollaboratorRole,
    new_role: CollaboratorRole,
    actor: &Actor,
) -> Envelope {
    let payload = CollaboratorRoleChangedPayload { user_id: user_id.to_string(), old_role, new_role };
    Envelope::new(PlanEvent::CollaboratorRoleChanged(payload), actor, plan_id)
}

// =============================================================================
// HELPERS
// =============================================================================

fn assignment(node_id: &str, assignee: &Actor) -> AssignmentPayload {
    AssignmentPayload {
        node_id: node_id.to_string(),
        assignee_id: assignee.user_id.clone(),
        assignee_name: assignee.user_name.clone(),
    }
}

fn to_owned_fields(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| (*f).to_string()).collect()
}

#[cfg(test)]
#[path = "factory_test.rs"]
mod tests;
