//! Service configuration parsed from environment variables.
//!
//! Every setting has a default except the identity provider: at least one of
//! `JWT_SECRET` or `AUTH_URL` must be present, otherwise nobody could ever
//! reach the `Connected` state.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TYPING_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no identity provider configured (set JWT_SECRET or AUTH_URL)")]
    MissingAuth,
}

/// Where bearer credentials get verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSource {
    /// Locally verified HS256 tokens.
    Jwt { secret: String },
    /// Remote identity provider answering `GET {url}/user`.
    Remote { url: String, timeout_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auth: AuthSource,
    pub typing_timeout: Duration,
    pub client_channel_capacity: usize,
}

impl Config {
    /// Build typed config from the process environment, loading `.env` first
    /// when one exists.
    ///
    /// Optional:
    /// - `HOST`, `PORT`
    /// - `JWT_SECRET` (takes precedence over `AUTH_URL`)
    /// - `AUTH_URL`, `AUTH_TIMEOUT_SECS`
    /// - `TYPING_TIMEOUT_MS`: default 5000
    /// - `CLIENT_CHANNEL_CAPACITY`: default 256
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAuth`] if neither identity variable is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAuth`] if neither identity variable is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let auth = if let Some(secret) = non_empty("JWT_SECRET") {
            AuthSource::Jwt { secret }
        } else if let Some(url) = non_empty("AUTH_URL") {
            AuthSource::Remote {
                url: url.trim_end_matches('/').to_string(),
                timeout_secs: parse_or(&lookup, "AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS),
            }
        } else {
            return Err(ConfigError::MissingAuth);
        };

        Ok(Self {
            host: non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            auth,
            typing_timeout: Duration::from_millis(parse_or(&lookup, "TYPING_TIMEOUT_MS", DEFAULT_TYPING_TIMEOUT_MS)),
            client_channel_capacity: parse_or(&lookup, "CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY)
                .max(1),
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
