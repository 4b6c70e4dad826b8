//! Broadcast façade used by the rest of the application.
//!
//! Every operation swallows realtime failures: callers get a `bool` (or an
//! empty list) and a log line, never an error. Business mutations that
//! trigger a broadcast must not fail because a socket did.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use super::server::{CollabServer, FanoutReport, RealtimeError};
use crate::events::{Envelope, EventKind};

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    server: Arc<RwLock<Option<CollabServer>>>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the presence server in. Replaces any previous instance.
    pub fn set_server(&self, server: CollabServer) {
        *self.server.write().unwrap_or_else(PoisonError::into_inner) = Some(server);
        info!("notifier: realtime server registered");
    }

    pub fn clear_server(&self) {
        *self.server.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("notifier: realtime server cleared");
    }

    #[must_use]
    pub fn server(&self) -> Option<CollabServer> {
        self.server
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.server
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // =========================================================================
    // NOTIFY
    // =========================================================================

    pub fn notify_plan_room(&self, plan_id: &str, envelope: Envelope, exclude: Option<&str>) -> bool {
        let kind = envelope.kind();
        let Some(server) = self.server() else {
            info!(%plan_id, %kind, "notifier: realtime server unavailable, skipping plan broadcast");
            return false;
        };
        report("plan", plan_id, kind, server.broadcast_to_plan(plan_id, envelope.into(), exclude))
    }

    /// `plan_id` is carried for logging only; delivery is by node room.
    pub fn notify_node_room(&self, node_id: &str, plan_id: &str, envelope: Envelope, exclude: Option<&str>) -> bool {
        let kind = envelope.kind();
        let Some(server) = self.server() else {
            info!(%node_id, %plan_id, %kind, "notifier: realtime server unavailable, skipping node broadcast");
            return false;
        };
        report("node", node_id, kind, server.broadcast_to_node(node_id, envelope.into(), exclude))
    }

    pub fn notify_everyone(&self, envelope: Envelope, exclude: Option<&str>) -> bool {
        let kind = envelope.kind();
        let Some(server) = self.server() else {
            info!(%kind, "notifier: realtime server unavailable, skipping global broadcast");
            return false;
        };
        report("everyone", "*", kind, server.broadcast_to_all(envelope.into(), exclude))
    }

    /// Direct message. A user without an open connection is a normal outcome.
    pub fn send_to_user(&self, user_id: &str, envelope: Envelope) -> bool {
        let kind = envelope.kind();
        let Some(server) = self.server() else {
            info!(%user_id, %kind, "notifier: realtime server unavailable, skipping direct message");
            return false;
        };
        if !server.is_connected(user_id) {
            info!(%user_id, %kind, "notifier: user not connected");
            return false;
        }
        match server.send_to_user(user_id, envelope.into()) {
            Ok(()) => {
                debug!(%user_id, %kind, "notifier: direct message delivered");
                true
            }
            Err(RealtimeError::NotConnected(_) | RealtimeError::ConnectionClosed(_)) => {
                info!(%user_id, %kind, "notifier: user disconnected before delivery");
                false
            }
            Err(e) => {
                warn!(%user_id, %kind, error = %e, "notifier: direct message failed");
                false
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn active_plan_users(&self, plan_id: &str) -> Vec<String> {
        self.server()
            .map(|s| s.active_plan_users(plan_id))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn active_node_users(&self, node_id: &str) -> Vec<String> {
        self.server()
            .map(|s| s.active_node_users(node_id))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn typing_users(&self, node_id: &str) -> Vec<String> {
        self.server()
            .map(|s| s.typing_users(node_id))
            .unwrap_or_default()
    }
}

fn report(scope: &str, target: &str, kind: EventKind, result: Result<FanoutReport, RealtimeError>) -> bool {
    match result {
        Ok(FanoutReport { delivered, skipped }) => {
            debug!(%scope, %target, %kind, delivered, skipped, "notifier: broadcast sent");
            true
        }
        Err(e) => {
            warn!(%scope, %target, %kind, error = %e, "notifier: broadcast failed");
            false
        }
    }
}

#[cfg(test)]
#[path = "notifier_test.rs"]
mod tests;
