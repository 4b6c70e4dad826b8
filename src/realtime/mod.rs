//! Realtime presence and fan-out.
//!
//! ARCHITECTURE
//! ============
//! `server` owns connection and room state and performs routed delivery.
//! `notifier` is the fire-and-forget façade the rest of the application calls
//! after a successful mutation. `rooms` is the membership set both build on.

pub mod notifier;
pub mod rooms;
pub mod server;

pub use notifier::Notifier;
pub use server::{CollabServer, FanoutReport, RealtimeError, Registration};
