//! Message envelope layer.
//!
//! ARCHITECTURE
//! ============
//! `types` defines the closed event taxonomy and the `{ type, payload,
//! metadata }` envelope; `factory` stamps actor, timestamp, routing plan id,
//! and schema version onto domain snapshots. Nothing here performs I/O.

pub mod factory;
pub mod types;

pub use types::{
    Actor, Collaborator, CollaboratorRole, Comment, Decision, DecisionStatus, Envelope, EventKind, EventMetadata,
    Label, LogEntry, NodeStatus, NodeType, Plan, PlanEvent, PlanNode, PlanStatus, SCHEMA_VERSION,
};
