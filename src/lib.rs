//! Realtime collaboration core for the plan backend: event envelopes, the
//! presence and broadcast server, and the fire-and-forget notifier façade.

pub mod config;
pub mod events;
pub mod protocol;
pub mod realtime;
pub mod routes;
pub mod services;
pub mod state;
