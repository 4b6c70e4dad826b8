//! Presence & broadcast server.
//!
//! DESIGN
//! ======
//! One registry owns every piece of live state: connections keyed by user id,
//! plan rooms, node rooms, per-node typing sets, and typing expiry timers.
//! It sits behind a `std::sync::Mutex` that is only ever held for synchronous
//! bookkeeping. Each mutation collects the messages it owes peers as
//! `Delivery` values, the lock is released, and then the deliveries are
//! pushed into per-connection `mpsc` channels with `try_send`. A slow or dead
//! peer therefore never blocks room state or other peers.
//!
//! LIFECYCLE
//! =========
//! 1. `register` → supersede any older connection for the user, send `connection`
//! 2. `handle` → join/leave/typing/presence/relay/ping intents
//! 3. `unregister` → stop typing everywhere, leave node, leave plan, deregister
//!
//! TYPING EXPIRY
//! =============
//! Each `typing_start` (re)arms one timer per (node, user). Timers carry a
//! generation number so a timer that was superseded but already woke up
//! cannot clear a newer typing indicator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::rooms::RoomMap;
use crate::config::Config;
use crate::protocol::{ClientMessage, ErrorCode, Outbound, PresenceMessage, now};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("realtime server is shutting down")]
    ShuttingDown,
    #[error("user {0} is not connected")]
    NotConnected(String),
    #[error("connection for user {0} is closed")]
    ConnectionClosed(String),
    #[error("outbound buffer full for user {0}")]
    Backpressure(String),
}

impl ErrorCode for RealtimeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ShuttingDown => "E_SHUTTING_DOWN",
            Self::NotConnected(_) => "E_NOT_CONNECTED",
            Self::ConnectionClosed(_) => "E_CONNECTION_CLOSED",
            Self::Backpressure(_) => "E_BACKPRESSURE",
        }
    }
}

/// Outcome of one fan-out. Members without an open connection are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub skipped: usize,
}

/// Handed to the socket task on successful registration.
#[derive(Debug)]
pub struct Registration {
    pub conn_id: Uuid,
    pub rx: mpsc::Receiver<Outbound>,
}

struct Connection {
    id: Uuid,
    tx: mpsc::Sender<Outbound>,
    current_plan: Option<String>,
    current_node: Option<String>,
}

struct TypingTimer {
    generation: u64,
    handle: AbortHandle,
}

struct Delivery {
    user_id: String,
    tx: mpsc::Sender<Outbound>,
    msg: Outbound,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<String, Connection>,
    plan_rooms: RoomMap,
    node_rooms: RoomMap,
    typing: RoomMap,
    /// Keyed by (node id, user id).
    typing_timers: HashMap<(String, String), TypingTimer>,
}

struct Inner {
    registry: Mutex<Registry>,
    typing_timeout: Duration,
    channel_capacity: usize,
    shutting_down: AtomicBool,
    next_timer_generation: AtomicU64,
}

/// Cheaply clonable handle to the process-wide presence server.
#[derive(Clone)]
pub struct CollabServer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CollabServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollabServer")
            .field("connections", &self.connection_count())
            .field("typing_timeout", &self.inner.typing_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

impl CollabServer {
    #[must_use]
    pub fn new(typing_timeout: Duration, channel_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                typing_timeout,
                channel_capacity: channel_capacity.max(1),
                shutting_down: AtomicBool::new(false),
                next_timer_generation: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.typing_timeout, config.client_channel_capacity)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    /// Drop every connection and all presence state. Later fan-outs fail
    /// with [`RealtimeError::ShuttingDown`].
    pub fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        let mut reg = self.registry();
        for (_, timer) in reg.typing_timers.drain() {
            timer.handle.abort();
        }
        let dropped = reg.connections.len();
        let (plan_rooms, node_rooms) = (reg.plan_rooms.room_count(), reg.node_rooms.room_count());
        *reg = Registry::default();
        info!(dropped, plan_rooms, node_rooms, "realtime: server shut down");
    }
}

// =============================================================================
// CONNECTION LIFECYCLE
// =============================================================================

impl CollabServer {
    /// Register an authenticated connection and send its `connection` ack.
    ///
    /// A previous connection for the same user is superseded: its rooms are
    /// left (peers are told) and its sender is dropped so its socket task ends.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ShuttingDown`] after [`Self::shutdown`].
    pub fn register(&self, user_id: &str) -> Result<Registration, RealtimeError> {
        if self.is_shutting_down() {
            return Err(RealtimeError::ShuttingDown);
        }

        let (tx, rx) = mpsc::channel(self.inner.channel_capacity);
        let conn_id = Uuid::new_v4();
        let mut out = Vec::new();
        {
            let mut reg = self.registry();
            if reg.connections.contains_key(user_id) {
                reg.release_presence(user_id, &mut out);
                info!(%user_id, "realtime: superseding previous connection");
            }
            reg.connections.insert(
                user_id.to_string(),
                Connection { id: conn_id, tx: tx.clone(), current_plan: None, current_node: None },
            );
        }

        out.push(Delivery {
            user_id: user_id.to_string(),
            tx,
            msg: PresenceMessage::Connection { user_id: user_id.to_string(), timestamp: now() }.into(),
        });
        deliver(out);

        info!(%user_id, %conn_id, "realtime: connection registered");
        Ok(Registration { conn_id, rx })
    }

    /// Tear down every presence trace of a closed connection. A connection
    /// that was already superseded leaves the newer one untouched.
    pub fn unregister(&self, user_id: &str, conn_id: Uuid) {
        let mut out = Vec::new();
        {
            let mut reg = self.registry();
            if !reg.is_current(user_id, conn_id) {
                debug!(%user_id, %conn_id, "realtime: stale connection closed");
                return;
            }
            reg.release_presence(user_id, &mut out);
            reg.connections.remove(user_id);
        }
        deliver(out);
        info!(%user_id, %conn_id, "realtime: connection unregistered");
    }

    /// Apply one client intent. The stale-connection check and the mutation
    /// share one lock guard, so a superseded socket can never act on the
    /// newer connection's cursor.
    pub fn handle(&self, user_id: &str, conn_id: Uuid, msg: ClientMessage) {
        let mut out = Vec::new();
        {
            let mut reg = self.registry();
            if !reg.is_current(user_id, conn_id) {
                debug!(%user_id, %conn_id, kind = msg.kind(), "realtime: ignoring message from stale connection");
                return;
            }

            match msg {
                ClientMessage::JoinPlan { plan_id } => reg.join_plan(user_id, &plan_id, &mut out),
                ClientMessage::LeavePlan => reg.leave_plan(user_id, &mut out),
                ClientMessage::JoinNode { node_id } => reg.join_node(user_id, &node_id, &mut out),
                ClientMessage::LeaveNode => reg.leave_node(user_id, &mut out),
                ClientMessage::TypingStart { node_id } => self.arm_typing(&mut reg, user_id, &node_id, &mut out),
                ClientMessage::TypingStop { node_id } => reg.stop_typing(user_id, &node_id, &mut out),
                ClientMessage::UpdatePresence { status } => reg.update_presence(user_id, &status, &mut out),
                ClientMessage::Broadcast { message } => reg.relay(user_id, message, &mut out),
                ClientMessage::Ping => {
                    let pong: Outbound = PresenceMessage::Pong { timestamp: now() }.into();
                    reg.collect(&[user_id.to_string()], &pong, &mut out);
                }
            }
        }
        deliver(out);
    }

    /// Send a structured `error` message to one connection.
    pub fn send_error(&self, user_id: &str, err: &(impl ErrorCode + ?Sized)) {
        let msg: Outbound = PresenceMessage::error(err).into();
        self.mutate(|reg, out| {
            reg.collect(&[user_id.to_string()], &msg, out);
        });
    }

    /// Run a registry mutation under the lock, then deliver what it queued.
    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Registry, &mut Vec<Delivery>),
    {
        let mut out = Vec::new();
        f(&mut *self.registry(), &mut out);
        deliver(out);
    }
}

// =============================================================================
// ROOMS
// =============================================================================

impl CollabServer {
    /// Join a plan room, leaving the previous one first.
    pub fn join_plan(&self, user_id: &str, plan_id: &str) {
        self.mutate(|reg, out| reg.join_plan(user_id, plan_id, out));
    }

    pub fn leave_plan(&self, user_id: &str) {
        self.mutate(|reg, out| reg.leave_plan(user_id, out));
    }

    /// Join a node room, leaving the previous one first. Independent of plan rooms.
    pub fn join_node(&self, user_id: &str, node_id: &str) {
        self.mutate(|reg, out| reg.join_node(user_id, node_id, out));
    }

    pub fn leave_node(&self, user_id: &str) {
        self.mutate(|reg, out| reg.leave_node(user_id, out));
    }
}

// =============================================================================
// TYPING / PRESENCE / RELAY
// =============================================================================

impl CollabServer {
    /// Mark the user as typing in a node and (re)arm the expiry timer.
    pub fn typing_start(&self, user_id: &str, node_id: &str) {
        self.mutate(|reg, out| self.arm_typing(reg, user_id, node_id, out));
    }

    /// Clear the typing flag. Absent entries are a no-op.
    pub fn typing_stop(&self, user_id: &str, node_id: &str) {
        self.mutate(|reg, out| reg.stop_typing(user_id, node_id, out));
    }

    /// Relay a presence status string to the user's plan-room peers.
    pub fn update_presence(&self, user_id: &str, status: &str) {
        self.mutate(|reg, out| reg.update_presence(user_id, status, out));
    }

    /// Relay an ad hoc client message to the sender's plan-room peers.
    pub fn relay(&self, user_id: &str, message: serde_json::Value) {
        self.mutate(|reg, out| reg.relay(user_id, message, out));
    }

    fn arm_typing(&self, reg: &mut Registry, user_id: &str, node_id: &str, out: &mut Vec<Delivery>) {
        reg.typing.insert(node_id, user_id);

        let msg: Outbound = PresenceMessage::TypingStart {
            user_id: user_id.to_string(),
            node_id: node_id.to_string(),
            timestamp: now(),
        }
        .into();
        let peers = reg.node_rooms.members_except(node_id, Some(user_id));
        reg.collect(&peers, &msg, out);

        let key = (node_id.to_string(), user_id.to_string());
        if let Some(previous) = reg.typing_timers.remove(&key) {
            previous.handle.abort();
            debug!(%user_id, %node_id, "realtime: typing timer re-armed");
        }

        let generation = self.inner.next_timer_generation.fetch_add(1, Ordering::Relaxed);
        let server = self.clone();
        let delay = self.inner.typing_timeout;
        let (timer_user, timer_node) = (user_id.to_string(), node_id.to_string());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            server.expire_typing(&timer_user, &timer_node, generation);
        });
        reg.typing_timers
            .insert(key, TypingTimer { generation, handle: handle.abort_handle() });
    }

    fn expire_typing(&self, user_id: &str, node_id: &str, generation: u64) {
        self.mutate(|reg, out| {
            let key = (node_id.to_string(), user_id.to_string());
            let current = reg
                .typing_timers
                .get(&key)
                .is_some_and(|timer| timer.generation == generation);
            if !current {
                return;
            }
            reg.typing_timers.remove(&key);
            debug!(%user_id, %node_id, "realtime: typing indicator expired");
            reg.stop_typing(user_id, node_id, out);
        });
    }
}

// =============================================================================
// FAN-OUT
// =============================================================================

impl CollabServer {
    /// Deliver to every open connection in a plan room except `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ShuttingDown`] after [`Self::shutdown`].
    pub fn broadcast_to_plan(
        &self,
        plan_id: &str,
        msg: Outbound,
        exclude: Option<&str>,
    ) -> Result<FanoutReport, RealtimeError> {
        self.fanout(|reg| reg.plan_rooms.members_except(plan_id, exclude), msg)
    }

    /// Deliver to every open connection in a node room except `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ShuttingDown`] after [`Self::shutdown`].
    pub fn broadcast_to_node(
        &self,
        node_id: &str,
        msg: Outbound,
        exclude: Option<&str>,
    ) -> Result<FanoutReport, RealtimeError> {
        self.fanout(|reg| reg.node_rooms.members_except(node_id, exclude), msg)
    }

    /// Deliver to every registered connection except `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ShuttingDown`] after [`Self::shutdown`].
    pub fn broadcast_to_all(&self, msg: Outbound, exclude: Option<&str>) -> Result<FanoutReport, RealtimeError> {
        self.fanout(
            |reg| {
                reg.connections
                    .keys()
                    .filter(|user_id| Some(user_id.as_str()) != exclude)
                    .cloned()
                    .collect()
            },
            msg,
        )
    }

    /// Deliver to one user's live connection.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::NotConnected`] if the user has no registered
    /// connection, [`RealtimeError::ConnectionClosed`] if its socket is gone,
    /// [`RealtimeError::Backpressure`] if its outbound buffer is full.
    pub fn send_to_user(&self, user_id: &str, msg: Outbound) -> Result<(), RealtimeError> {
        if self.is_shutting_down() {
            return Err(RealtimeError::ShuttingDown);
        }
        let tx = self
            .registry()
            .connections
            .get(user_id)
            .map(|c| c.tx.clone())
            .ok_or_else(|| RealtimeError::NotConnected(user_id.to_string()))?;

        match tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RealtimeError::Backpressure(user_id.to_string())),
            Err(TrySendError::Closed(_)) => Err(RealtimeError::ConnectionClosed(user_id.to_string())),
        }
    }

    fn fanout<F>(&self, recipients: F, msg: Outbound) -> Result<FanoutReport, RealtimeError>
    where
        F: FnOnce(&Registry) -> Vec<String>,
    {
        if self.is_shutting_down() {
            return Err(RealtimeError::ShuttingDown);
        }
        let mut out = Vec::new();
        let missing = {
            let reg = self.registry();
            let users = recipients(&reg);
            reg.collect(&users, &msg, &mut out)
        };
        let mut report = deliver(out);
        report.skipped += missing;
        Ok(report)
    }
}

// =============================================================================
// QUERIES
// =============================================================================

impl CollabServer {
    /// Users currently in a plan room. Unknown rooms yield an empty list.
    #[must_use]
    pub fn active_plan_users(&self, plan_id: &str) -> Vec<String> {
        self.registry().plan_rooms.members(plan_id)
    }

    /// Users currently viewing a node. Unknown rooms yield an empty list.
    #[must_use]
    pub fn active_node_users(&self, node_id: &str) -> Vec<String> {
        self.registry().node_rooms.members(node_id)
    }

    /// Users currently typing in a node. Unknown nodes yield an empty list.
    #[must_use]
    pub fn typing_users(&self, node_id: &str) -> Vec<String> {
        self.registry().typing.members(node_id)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry().connections.len()
    }

    #[must_use]
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.registry()
            .connections
            .get(user_id)
            .is_some_and(|c| !c.tx.is_closed())
    }
}

// =============================================================================
// REGISTRY INTENTS
// =============================================================================

impl Registry {
    fn join_plan(&mut self, user_id: &str, plan_id: &str, out: &mut Vec<Delivery>) {
        let Some(previous) = self.connections.get(user_id).map(|c| c.current_plan.clone()) else {
            warn!(%user_id, %plan_id, "realtime: join_plan without a connection");
            return;
        };

        if !self.plan_rooms.contains(plan_id, user_id) {
            if let Some(old_plan) = previous {
                self.leave_plan_room(user_id, &old_plan, out);
            }
            self.plan_rooms.insert(plan_id, user_id);
            if let Some(conn) = self.connections.get_mut(user_id) {
                conn.current_plan = Some(plan_id.to_string());
            }
            let joined: Outbound = PresenceMessage::UserJoinedPlan {
                user_id: user_id.to_string(),
                plan_id: plan_id.to_string(),
                timestamp: now(),
            }
            .into();
            let peers = self.plan_rooms.members_except(plan_id, Some(user_id));
            self.collect(&peers, &joined, out);
        }

        let snapshot: Outbound = PresenceMessage::ActiveUsers {
            plan_id: plan_id.to_string(),
            users: self.plan_rooms.members(plan_id),
            timestamp: now(),
        }
        .into();
        self.collect(&[user_id.to_string()], &snapshot, out);
        info!(%user_id, %plan_id, "realtime: joined plan room");
    }

    fn leave_plan(&mut self, user_id: &str, out: &mut Vec<Delivery>) {
        let Some(plan_id) = self.connections.get_mut(user_id).and_then(|c| c.current_plan.take()) else {
            return;
        };
        self.leave_plan_room(user_id, &plan_id, out);
        info!(%user_id, %plan_id, "realtime: left plan room");
    }

    fn join_node(&mut self, user_id: &str, node_id: &str, out: &mut Vec<Delivery>) {
        let Some(previous) = self.connections.get(user_id).map(|c| c.current_node.clone()) else {
            warn!(%user_id, %node_id, "realtime: join_node without a connection");
            return;
        };

        if !self.node_rooms.contains(node_id, user_id) {
            if let Some(old_node) = previous {
                self.leave_node_room(user_id, &old_node, out);
            }
            self.node_rooms.insert(node_id, user_id);
            if let Some(conn) = self.connections.get_mut(user_id) {
                conn.current_node = Some(node_id.to_string());
            }
            let joined: Outbound = PresenceMessage::UserJoinedNode {
                user_id: user_id.to_string(),
                node_id: node_id.to_string(),
                timestamp: now(),
            }
            .into();
            let peers = self.node_rooms.members_except(node_id, Some(user_id));
            self.collect(&peers, &joined, out);
        }

        let snapshot: Outbound = PresenceMessage::NodeViewers {
            node_id: node_id.to_string(),
            users: self.node_rooms.members(node_id),
            timestamp: now(),
        }
        .into();
        self.collect(&[user_id.to_string()], &snapshot, out);
        info!(%user_id, %node_id, "realtime: joined node room");
    }

    fn leave_node(&mut self, user_id: &str, out: &mut Vec<Delivery>) {
        let Some(node_id) = self.connections.get_mut(user_id).and_then(|c| c.current_node.take()) else {
            return;
        };
        self.leave_node_room(user_id, &node_id, out);
        info!(%user_id, %node_id, "realtime: left node room");
    }

    fn update_presence(&self, user_id: &str, status: &str, out: &mut Vec<Delivery>) {
        let Some(plan_id) = self.current_plan(user_id) else {
            debug!(%user_id, "realtime: presence update outside a plan room");
            return;
        };
        let msg: Outbound = PresenceMessage::PresenceUpdate {
            user_id: user_id.to_string(),
            plan_id: plan_id.clone(),
            status: status.to_string(),
            timestamp: now(),
        }
        .into();
        let peers = self.plan_rooms.members_except(&plan_id, Some(user_id));
        self.collect(&peers, &msg, out);
    }

    fn relay(&self, user_id: &str, message: serde_json::Value, out: &mut Vec<Delivery>) {
        let Some(plan_id) = self.current_plan(user_id) else {
            debug!(%user_id, "realtime: relay outside a plan room");
            return;
        };
        let msg: Outbound = PresenceMessage::Broadcast {
            user_id: user_id.to_string(),
            plan_id: plan_id.clone(),
            message,
            timestamp: now(),
        }
        .into();
        let peers = self.plan_rooms.members_except(&plan_id, Some(user_id));
        self.collect(&peers, &msg, out);
    }
}

// =============================================================================
// REGISTRY BOOKKEEPING
// =============================================================================

impl Registry {
    fn is_current(&self, user_id: &str, conn_id: Uuid) -> bool {
        self.connections
            .get(user_id)
            .is_some_and(|c| c.id == conn_id)
    }

    fn current_plan(&self, user_id: &str) -> Option<String> {
        self.connections
            .get(user_id)
            .and_then(|c| c.current_plan.clone())
    }

    /// Queue `msg` for each user with a registered connection. Returns how
    /// many users had none.
    fn collect(&self, users: &[String], msg: &Outbound, out: &mut Vec<Delivery>) -> usize {
        let mut missing = 0;
        for user_id in users {
            match self.connections.get(user_id) {
                Some(conn) => out.push(Delivery { user_id: user_id.clone(), tx: conn.tx.clone(), msg: msg.clone() }),
                None => missing += 1,
            }
        }
        missing
    }

    fn leave_plan_room(&mut self, user_id: &str, plan_id: &str, out: &mut Vec<Delivery>) {
        if !self.plan_rooms.remove(plan_id, user_id) {
            return;
        }
        let msg: Outbound = PresenceMessage::UserLeftPlan {
            user_id: user_id.to_string(),
            plan_id: plan_id.to_string(),
            timestamp: now(),
        }
        .into();
        let peers = self.plan_rooms.members(plan_id);
        self.collect(&peers, &msg, out);
    }

    fn leave_node_room(&mut self, user_id: &str, node_id: &str, out: &mut Vec<Delivery>) {
        self.stop_typing(user_id, node_id, out);
        if !self.node_rooms.remove(node_id, user_id) {
            return;
        }
        let msg: Outbound = PresenceMessage::UserLeftNode {
            user_id: user_id.to_string(),
            node_id: node_id.to_string(),
            timestamp: now(),
        }
        .into();
        let peers = self.node_rooms.members(node_id);
        self.collect(&peers, &msg, out);
    }

    fn stop_typing(&mut self, user_id: &str, node_id: &str, out: &mut Vec<Delivery>) {
        if let Some(timer) = self
            .typing_timers
            .remove(&(node_id.to_string(), user_id.to_string()))
        {
            timer.handle.abort();
        }
        if !self.typing.remove(node_id, user_id) {
            return;
        }
        let msg: Outbound = PresenceMessage::TypingStop {
            user_id: user_id.to_string(),
            node_id: node_id.to_string(),
            timestamp: now(),
        }
        .into();
        let peers = self.node_rooms.members_except(node_id, Some(user_id));
        self.collect(&peers, &msg, out);
    }

    /// Stop typing everywhere, then leave the current node and plan rooms.
    fn release_presence(&mut self, user_id: &str, out: &mut Vec<Delivery>) {
        let (plan, node) = match self.connections.get_mut(user_id) {
            Some(conn) => (conn.current_plan.take(), conn.current_node.take()),
            None => (None, None),
        };

        self.typing_timers.retain(|(_, u), timer| {
            if u == user_id {
                timer.handle.abort();
                return false;
            }
            true
        });

        // remove_everywhere already dropped the set entries; emit the stops here.
        for node_id in self.typing.remove_everywhere(user_id) {
            let msg: Outbound = PresenceMessage::TypingStop {
                user_id: user_id.to_string(),
                node_id: node_id.clone(),
                timestamp: now(),
            }
            .into();
            let peers = self.node_rooms.members_except(&node_id, Some(user_id));
            self.collect(&peers, &msg, out);
        }

        if let Some(node_id) = node {
            self.leave_node_room(user_id, &node_id, out);
        }
        if let Some(plan_id) = plan {
            self.leave_plan_room(user_id, &plan_id, out);
        }
    }
}

/// Push queued messages without holding the registry lock.
fn deliver(out: Vec<Delivery>) -> FanoutReport {
    let mut report = FanoutReport::default();
    for Delivery { user_id, tx, msg } in out {
        if tx.is_closed() {
            debug!(%user_id, "realtime: connection closed, message skipped");
            report.skipped += 1;
            continue;
        }
        match tx.try_send(msg) {
            Ok(()) => report.delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!(%user_id, "realtime: outbound buffer full, dropping message");
                report.skipped += 1;
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%user_id, "realtime: connection closed, message skipped");
                report.skipped += 1;
            }
        }
    }
    report
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
