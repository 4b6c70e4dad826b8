//! Client ↔ server socket protocol.
//!
//! DESIGN
//! ======
//! Two outbound shapes share one socket: versioned lifecycle envelopes
//! (`{ type, payload, metadata }`) and light presence/housekeeping messages
//! (`{ type, userId, timestamp, ... }`). `Outbound` keeps them apart in the
//! type system and serializes untagged so clients see both forms unchanged.
//!
//! Inbound decoding is two-step: the `type` tag is read first so an unknown
//! type can be ignored quietly, while a known type with a bad body is a
//! malformed message that earns an `error` reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::events::Envelope;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured `error` messages.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED",
            Self::UnknownType(_) => "E_UNKNOWN_TYPE",
        }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Intent messages a connected client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinPlan { plan_id: String },
    LeavePlan,
    JoinNode { node_id: String },
    LeaveNode,
    TypingStart { node_id: String },
    TypingStop { node_id: String },
    UpdatePresence { status: String },
    Broadcast { message: serde_json::Value },
    Ping,
}

const KNOWN_TYPES: [&str; 9] = [
    "join_plan",
    "leave_plan",
    "join_node",
    "leave_node",
    "typing_start",
    "typing_stop",
    "update_presence",
    "broadcast",
    "ping",
];

impl ClientMessage {
    /// Decode one inbound text message.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnknownType`] when `type` is not one of the
    /// recognized intents; [`ProtocolError::Malformed`] for invalid JSON, a
    /// missing `type`, or a recognized type missing a required field.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(format!("invalid json: {e}")))?;

        let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
            return Err(ProtocolError::Malformed("missing type".into()));
        };
        if !KNOWN_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Wire name of this intent.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinPlan { .. } => KNOWN_TYPES[0],
            Self::LeavePlan => KNOWN_TYPES[1],
            Self::JoinNode { .. } => KNOWN_TYPES[2],
            Self::LeaveNode => KNOWN_TYPES[3],
            Self::TypingStart { .. } => KNOWN_TYPES[4],
            Self::TypingStop { .. } => KNOWN_TYPES[5],
            Self::UpdatePresence { .. } => KNOWN_TYPES[6],
            Self::Broadcast { .. } => KNOWN_TYPES[7],
            Self::Ping => KNOWN_TYPES[8],
        }
    }
}

// =============================================================================
// OUTBOUND PRESENCE
// =============================================================================

/// Unversioned presence and connection housekeeping messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PresenceMessage {
    Connection {
        user_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Pong {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Error {
        code: String,
        message: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    UserJoinedPlan {
        user_id: String,
        plan_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    UserLeftPlan {
        user_id: String,
        plan_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    UserJoinedNode {
        user_id: String,
        node_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    UserLeftNode {
        user_id: String,
        node_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    TypingStart {
        user_id: String,
        node_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    TypingStop {
        user_id: String,
        node_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    PresenceUpdate {
        user_id: String,
        plan_id: String,
        status: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// Snapshot of a plan room, sent to a user right after joining it.
    ActiveUsers {
        plan_id: String,
        users: Vec<String>,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// Snapshot of a node room, sent to a user right after joining it.
    NodeViewers {
        node_id: String,
        users: Vec<String>,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// Ad hoc client message relayed to plan-room peers.
    Broadcast {
        user_id: String,
        plan_id: String,
        message: serde_json::Value,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
}

impl PresenceMessage {
    pub fn error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { code: err.error_code().to_string(), message: err.to_string(), timestamp: now() }
    }

    /// Wire name, matching the serialized `type`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
            Self::UserJoinedPlan { .. } => "user_joined_plan",
            Self::UserLeftPlan { .. } => "user_left_plan",
            Self::UserJoinedNode { .. } => "user_joined_node",
            Self::UserLeftNode { .. } => "user_left_node",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
            Self::PresenceUpdate { .. } => "presence_update",
            Self::ActiveUsers { .. } => "active_users",
            Self::NodeViewers { .. } => "node_viewers",
            Self::Broadcast { .. } => "broadcast",
        }
    }
}

/// Current UTC time for presence timestamps.
#[must_use]
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Anything the server pushes down a socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Event(Arc<Envelope>),
    Presence(PresenceMessage),
}

impl Outbound {
    /// Wire `type` of the message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event(env) => env.kind().as_str(),
            Self::Presence(msg) => msg.kind(),
        }
    }

    #[must_use]
    pub fn as_presence(&self) -> Option<&PresenceMessage> {
        match self {
            Self::Presence(msg) => Some(msg),
            Self::Event(_) => None,
        }
    }

    #[must_use]
    pub fn as_event(&self) -> Option<&Envelope> {
        match self {
            Self::Event(env) => Some(env),
            Self::Presence(_) => None,
        }
    }
}

impl From<PresenceMessage> for Outbound {
    fn from(msg: PresenceMessage) -> Self {
        Self::Presence(msg)
    }
}

impl From<Envelope> for Outbound {
    fn from(env: Envelope) -> Self {
        Self::Event(Arc::new(env))
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
