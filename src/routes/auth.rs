//! Bearer authentication for HTTP routes.

use axum::extract::FromRef;
use axum::http::StatusCode;
use tracing::{debug, warn};

use crate::services::identity::{self, Identity, IdentityError};
use crate::state::AppState;

/// Authenticated caller extracted from `Authorization: Bearer`.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub identity: Identity,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = identity::extract_token(None, &parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        let identity = app_state
            .verifier
            .verify(&token)
            .await
            .map_err(|e| rejection_status(&e))?;

        debug!(user_id = %identity.user_id, "http: authenticated");
        Ok(Self { identity })
    }
}

fn rejection_status(err: &IdentityError) -> StatusCode {
    match err {
        IdentityError::Provider(msg) => {
            warn!(error = %msg, "http: identity provider unavailable");
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::UNAUTHORIZED,
    }
}
