//! Event taxonomy, payload shapes, and the versioned envelope.
//!
//! DESIGN
//! ======
//! `PlanEvent` is adjacently tagged (`type` + `payload`) and flattened into
//! `Envelope`, so the wire form is always `{ type, payload, metadata }` while
//! the compiler sees one variant per event kind with its own payload struct.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Semantic version of the envelope schema, stamped into every envelope.
pub const SCHEMA_VERSION: &str = "1.0.0";

// =============================================================================
// DOMAIN SNAPSHOTS
// =============================================================================

/// The user performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub user_name: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), user_name: None }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Phase,
    Task,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
    PlanReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Viewer,
    Editor,
    Admin,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Decided,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: PlanStatus,
    pub owner_id: String,
}

/// One node of a plan's tree (phase, task, or milestone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    pub id: String,
    pub plan_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: NodeStatus,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub plan_id: String,
    pub node_id: String,
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub plan_id: String,
    pub node_id: String,
    pub user_id: String,
    pub content: String,
    pub log_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub plan_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub context: Option<String>,
    pub status: DecisionStatus,
    /// The chosen outcome. `None` while pending.
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub plan_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub role: CollaboratorRole,
}

// =============================================================================
// EVENT KINDS
// =============================================================================

/// Closed taxonomy of lifecycle and collaboration events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlanCreated,
    PlanUpdated,
    PlanDeleted,
    PlanStatusChanged,
    NodeCreated,
    NodeUpdated,
    NodeDeleted,
    NodeMoved,
    NodeStatusChanged,
    UserAssigned,
    UserUnassigned,
    CommentAdded,
    CommentUpdated,
    CommentDeleted,
    LogAdded,
    LabelAdded,
    LabelRemoved,
    DecisionRequested,
    DecisionResolved,
    CollaboratorAdded,
    CollaboratorRemoved,
    CollaboratorRoleChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 22] = [
        Self::PlanCreated,
        Self::PlanUpdated,
        Self::PlanDeleted,
        Self::PlanStatusChanged,
        Self::NodeCreated,
        Self::NodeUpdated,
        Self::NodeDeleted,
        Self::NodeMoved,
        Self::NodeStatusChanged,
        Self::UserAssigned,
        Self::UserUnassigned,
        Self::CommentAdded,
        Self::CommentUpdated,
        Self::CommentDeleted,
        Self::LogAdded,
        Self::LabelAdded,
        Self::LabelRemoved,
        Self::DecisionRequested,
        Self::DecisionResolved,
        Self::CollaboratorAdded,
        Self::CollaboratorRemoved,
        Self::CollaboratorRoleChanged,
    ];

    /// Dotted wire name, e.g. `node.status_changed`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlanCreated => "plan.created",
            Self::PlanUpdated => "plan.updated",
            Self::PlanDeleted => "plan.deleted",
            Self::PlanStatusChanged => "plan.status_changed",
            Self::NodeCreated => "node.created",
            Self::NodeUpdated => "node.updated",
            Self::NodeDeleted => "node.deleted",
            Self::NodeMoved => "node.moved",
            Self::NodeStatusChanged => "node.status_changed",
            Self::UserAssigned => "collaboration.user_assigned",
            Self::UserUnassigned => "collaboration.user_unassigned",
            Self::CommentAdded => "collaboration.comment_added",
            Self::CommentUpdated => "collaboration.comment_updated",
            Self::CommentDeleted => "collaboration.comment_deleted",
            Self::LogAdded => "collaboration.log_added",
            Self::LabelAdded => "collaboration.label_added",
            Self::LabelRemoved => "collaboration.label_removed",
            Self::DecisionRequested => "collaboration.decision_requested",
            Self::DecisionResolved => "collaboration.decision_resolved",
            Self::CollaboratorAdded => "collaborator.added",
            Self::CollaboratorRemoved => "collaborator.removed",
            Self::CollaboratorRoleChanged => "collaborator.role_changed",
        }
    }

    /// Event family, the part before the dot.
    #[must_use]
    pub fn family(self) -> &'static str {
        let name = self.as_str();
        name.split_once('.').map_or(name, |(family, _)| family)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPayload {
    pub plan: Plan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdatedPayload {
    pub plan: Plan,
    #[serde(default)]
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDeletedPayload {
    pub plan_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatusChangedPayload {
    pub plan_id: String,
    pub old_status: PlanStatus,
    pub new_status: PlanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePayload {
    pub node: PlanNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdatedPayload {
    pub node: PlanNode,
    #[serde(default)]
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeletedPayload {
    pub node_id: String,
    pub parent_id: Option<String>,
}

/// Before/after placement so receivers can reconcile a reorder in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMovedPayload {
    pub node_id: String,
    pub old_parent_id: Option<String>,
    pub new_parent_id: Option<String>,
    pub old_order_index: i32,
    pub new_order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusChangedPayload {
    pub node_id: String,
    pub old_status: NodeStatus,
    pub new_status: NodeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPayload {
    pub node_id: String,
    pub assignee_id: String,
    pub assignee_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub node_id: String,
    pub comment: Comment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeletedPayload {
    pub node_id: String,
    pub comment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload {
    pub node_id: String,
    pub log: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPayload {
    pub node_id: String,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorPayload {
    pub collaborator: Collaborator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorRemovedPayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorRoleChangedPayload {
    pub user_id: String,
    pub old_role: CollaboratorRole,
    pub new_role: CollaboratorRole,
}

// =============================================================================
// EVENT SUM TYPE
// =============================================================================

/// Every lifecycle and collaboration event with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlanEvent {
    #[serde(rename = "plan.created")]
    PlanCreated(PlanPayload),
    #[serde(rename = "plan.updated")]
    PlanUpdated(PlanUpdatedPayload),
    #[serde(rename = "plan.deleted")]
    PlanDeleted(PlanDeletedPayload),
    #[serde(rename = "plan.status_changed")]
    PlanStatusChanged(PlanStatusChangedPayload),
    #[serde(rename = "node.created")]
    NodeCreated(NodePayload),
    #[serde(rename = "node.updated")]
    NodeUpdated(NodeUpdatedPayload),
    #[serde(rename = "node.deleted")]
    NodeDeleted(NodeDeletedPayload),
    #[serde(rename = "node.moved")]
    NodeMoved(NodeMovedPayload),
    #[serde(rename = "node.status_changed")]
    NodeStatusChanged(NodeStatusChangedPayload),
    #[serde(rename = "collaboration.user_assigned")]
    UserAssigned(AssignmentPayload),
    #[serde(rename = "collaboration.user_unassigned")]
    UserUnassigned(AssignmentPayload),
    #[serde(rename = "collaboration.comment_added")]
    CommentAdded(CommentPayload),
    #[serde(rename = "collaboration.comment_updated")]
    CommentUpdated(CommentPayload),
    #[serde(rename = "collaboration.comment_deleted")]
    CommentDeleted(CommentDeletedPayload),
    #[serde(rename = "collaboration.log_added")]
    LogAdded(LogPayload),
    #[serde(rename = "collaboration.label_added")]
    LabelAdded(LabelPayload),
    #[serde(rename = "collaboration.label_removed")]
    LabelRemoved(LabelPayload),
    #[serde(rename = "collaboration.decision_requested")]
    DecisionRequested(DecisionPayload),
    #[serde(rename = "collaboration.decision_resolved")]
    DecisionResolved(DecisionPayload),
    #[serde(rename = "collaborator.added")]
    CollaboratorAdded(CollaboratorPayload),
    #[serde(rename = "collaborator.removed")]
    CollaboratorRemoved(CollaboratorRemovedPayload),
    #[serde(rename = "collaborator.role_changed")]
    CollaboratorRoleChanged(CollaboratorRoleChangedPayload),
}

impl PlanEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PlanCreated(_) => EventKind::PlanCreated,
            Self::PlanUpdated(_) => EventKind::PlanUpdated,
            Self::PlanDeleted(_) => EventKind::PlanDeleted,
            Self::PlanStatusChanged(_) => EventKind::PlanStatusChanged,
            Self::NodeCreated(_) => EventKind::NodeCreated,
            Self::NodeUpdated(_) => EventKind::NodeUpdated,
            Self::NodeDeleted(_) => EventKind::NodeDeleted,
            Self::NodeMoved(_) => EventKind::NodeMoved,
            Self::NodeStatusChanged(_) => EventKind::NodeStatusChanged,
            Self::UserAssigned(_) => EventKind::UserAssigned,
            Self::UserUnassigned(_) => EventKind::UserUnassigned,
            Self::CommentAdded(_) => EventKind::CommentAdded,
            Self::CommentUpdated(_) => EventKind::CommentUpdated,
            Self::CommentDeleted(_) => EventKind::CommentDeleted,
            Self::LogAdded(_) => EventKind::LogAdded,
            Self::LabelAdded(_) => EventKind::LabelAdded,
            Self::LabelRemoved(_) => EventKind::LabelRemoved,
            Self::DecisionRequested(_) => EventKind::DecisionRequested,
            Self::DecisionResolved(_) => EventKind::DecisionResolved,
            Self::CollaboratorAdded(_) => EventKind::CollaboratorAdded,
            Self::CollaboratorRemoved(_) => EventKind::CollaboratorRemoved,
            Self::CollaboratorRoleChanged(_) => EventKind::CollaboratorRoleChanged,
        }
    }

    /// The node this event is about, if it is node-scoped.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeCreated(p) => Some(p.node.id.as_str()),
            Self::NodeUpdated(p) => Some(p.node.id.as_str()),
            Self::NodeDeleted(p) => Some(p.node_id.as_str()),
            Self::NodeMoved(p) => Some(p.node_id.as_str()),
            Self::NodeStatusChanged(p) => Some(p.node_id.as_str()),
            Self::UserAssigned(p) | Self::UserUnassigned(p) => Some(p.node_id.as_str()),
            Self::CommentAdded(p) | Self::CommentUpdated(p) => Some(p.node_id.as_str()),
            Self::CommentDeleted(p) => Some(p.node_id.as_str()),
            Self::LogAdded(p) => Some(p.node_id.as_str()),
            Self::LabelAdded(p) | Self::LabelRemoved(p) => Some(p.node_id.as_str()),
            Self::DecisionRequested(p) | Self::DecisionResolved(p) => p.decision.node_id.as_deref(),
            Self::PlanCreated(_)
            | Self::PlanUpdated(_)
            | Self::PlanDeleted(_)
            | Self::PlanStatusChanged(_)
            | Self::CollaboratorAdded(_)
            | Self::CollaboratorRemoved(_)
            | Self::CollaboratorRoleChanged(_) => None,
        }
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub user_id: String,
    pub user_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Owning plan, present even for node-scoped events so routing never
    /// needs a second lookup.
    pub plan_id: String,
    pub version: String,
}

/// Immutable `{ type, payload, metadata }` value handed to the broadcast layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: PlanEvent,
    pub metadata: EventMetadata,
}

impl Envelope {
    /// Stamp metadata onto an event. Timestamp is taken now, in UTC.
    pub fn new(event: PlanEvent, actor: &Actor, plan_id: impl Into<String>) -> Self {
        Self {
            event,
            metadata: EventMetadata {
                user_id: actor.user_id.clone(),
                user_name: actor.user_name.clone(),
                timestamp: OffsetDateTime::now_utc(),
                plan_id: plan_id.into(),
                version: SCHEMA_VERSION.to_string(),
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    #[must_use]
    pub fn plan_id(&self) -> &str {
        &self.metadata.plan_id
    }

    #[must_use]
    pub fn actor_id(&self) -> &str {
        &self.metadata.user_id
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
