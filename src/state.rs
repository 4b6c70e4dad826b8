//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! presence server is owned here and also registered with the `Notifier`, so
//! socket handlers talk to the server directly while HTTP handlers (and any
//! other business code) go through the failure-containing façade.

use std::sync::Arc;

use crate::config::Config;
use crate::realtime::{CollabServer, Notifier};
use crate::services::identity::IdentityVerifier;

/// Clone is required by Axum; all inner fields are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub server: CollabServer,
    pub notifier: Notifier,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    /// Build state and wire the presence server into the notifier.
    #[must_use]
    pub fn new(config: Config, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let server = CollabServer::from_config(&config);
        let notifier = Notifier::new();
        notifier.set_server(server.clone());
        Self { config: Arc::new(config), server, notifier, verifier }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
