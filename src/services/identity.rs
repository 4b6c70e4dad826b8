//! Bearer credential verification.
//!
//! Sockets authenticate exactly once, at upgrade time. Two backends exist: a
//! local HS256 JWT check and a remote identity provider queried over HTTP.
//! Both map failures onto [`IdentityError`] so the socket layer can tell a
//! dead credential (stop retrying) from everything else.

use std::time::Duration;

use axum::http::{HeaderMap, header};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::AuthSource;
use crate::protocol::ErrorCode;

/// Resolved identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("no credential supplied")]
    MissingToken,
    #[error("credential expired")]
    Expired,
    #[error("credential signature invalid")]
    InvalidSignature,
    #[error("credential rejected: {0}")]
    Rejected(String),
    #[error("unknown user")]
    UnknownUser,
    #[error("identity provider error: {0}")]
    Provider(String),
}

impl IdentityError {
    /// The credential can never succeed; clients should not retry with it.
    #[must_use]
    pub fn is_dead_credential(&self) -> bool {
        matches!(self, Self::Expired | Self::InvalidSignature)
    }
}

impl ErrorCode for IdentityError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "E_MISSING_TOKEN",
            Self::Expired => "E_TOKEN_EXPIRED",
            Self::InvalidSignature => "E_INVALID_SIGNATURE",
            Self::Rejected(_) => "E_TOKEN_REJECTED",
            Self::UnknownUser => "E_UNKNOWN_USER",
            Self::Provider(_) => "E_AUTH_PROVIDER",
        }
    }
}

#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Build the verifier selected by configuration.
///
/// # Errors
///
/// Returns [`IdentityError::Provider`] if the HTTP client cannot be built.
pub fn from_source(source: &AuthSource) -> Result<std::sync::Arc<dyn IdentityVerifier>, IdentityError> {
    Ok(match source {
        AuthSource::Jwt { secret } => std::sync::Arc::new(JwtVerifier::new(secret)),
        AuthSource::Remote { url, timeout_secs } => {
            std::sync::Arc::new(RemoteVerifier::new(url, Duration::from_secs(*timeout_secs))?)
        }
    })
}

// =============================================================================
// TOKEN EXTRACTION
// =============================================================================

/// Pick the bearer credential: `token` query parameter first, then the
/// `Authorization: Bearer` header. The scheme is case-insensitive and blank
/// values count as absent.
#[must_use]
pub fn extract_token(query_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim_start().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token)
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// =============================================================================
// JWT
// =============================================================================

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
}

/// HS256 shared-secret verifier. `exp` is required.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => IdentityError::Expired,
            ErrorKind::InvalidSignature => IdentityError::InvalidSignature,
            _ => IdentityError::Rejected(e.to_string()),
        })?;
        if data.claims.sub.is_empty() {
            return Err(IdentityError::UnknownUser);
        }
        Ok(Identity { user_id: data.claims.sub, name: data.claims.name })
    }
}

// =============================================================================
// REMOTE PROVIDER
// =============================================================================

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Verifies tokens against `GET {base_url}/user`.
pub struct RemoteVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteVerifier {
    /// # Errors
    ///
    /// Returns [`IdentityError::Provider`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Provider(e.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for RemoteVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let resp = self
            .client
            .get(format!("{}/user", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            let user: RemoteUser = resp
                .json()
                .await
                .map_err(|e| IdentityError::Provider(format!("unexpected response: {e}")))?;
            return Ok(Identity { user_id: user.id, name: user.name });
        }

        let body = resp.text().await.unwrap_or_default();
        Err(classify_rejection(status, &body))
    }
}

fn classify_rejection(status: StatusCode, body: &str) -> IdentityError {
    match status {
        StatusCode::UNAUTHORIZED if body.to_ascii_lowercase().contains("expired") => IdentityError::Expired,
        StatusCode::UNAUTHORIZED => IdentityError::InvalidSignature,
        // The credential is valid but access is refused.
        StatusCode::FORBIDDEN => IdentityError::Rejected(format!("forbidden: {}", body.trim())),
        StatusCode::NOT_FOUND => IdentityError::UnknownUser,
        other => IdentityError::Provider(format!("status {other}")),
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
