//! Identity-provider and ticket configuration.
//!
//! Loaded from environment variables with defaults for a local Keycloak.
//! The embedding service decides when to call [`AuthConfig::from_env`];
//! nothing in this crate reads the environment on its own.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::error::AuthError;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::Configuration(err.to_string())
    }
}

/// Identity-provider connection and ticket lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Keycloak base URL (e.g., "https://idp.example.com").
    pub idp_base_url: String,

    /// Realm name.
    pub realm: String,

    /// Client id used as UMA audience.
    pub client_id: String,

    /// Explicit certs URL; derived from base URL and realm when unset.
    pub certs_url: Option<String>,

    /// Workspace ticket lifetime in seconds.
    pub ticket_ttl_secs: u64,

    /// Re-issue a stored ticket when it expires within this many seconds.
    pub ticket_reissue_secs: u64,

    /// Timeout for calls to the identity provider in seconds.
    pub http_timeout_secs: u64,
}

impl Default for AuthConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            idp_base_url: "http://localhost:8080".to_string(),
            realm: "mciam".to_string(),
            client_id: "mciam-client".to_string(),
            certs_url: None,
            ticket_ttl_secs: 30 * 60,
            ticket_reissue_secs: 60,
            http_timeout_secs: 10,
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MCIAM_IDP_BASE_URL`: Keycloak URL (default: http://localhost:8080)
    /// - `MCIAM_IDP_REALM`: Realm name (default: mciam)
    /// - `MCIAM_IDP_CLIENT_ID`: Client id (default: mciam-client)
    /// - `MCIAM_IDP_CERTS_URL`: JWKS URL (default: derived from URL and realm)
    /// - `MCIAM_TICKET_TTL_SECS`: Ticket lifetime (default: 1800)
    /// - `MCIAM_TICKET_REISSUE_SECS`: Re-issue window (default: 60)
    /// - `MCIAM_HTTP_TIMEOUT_SECS`: Identity-provider timeout (default: 10)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            idp_base_url: std::env::var("MCIAM_IDP_BASE_URL").unwrap_or(default.idp_base_url),
            realm: std::env::var("MCIAM_IDP_REALM").unwrap_or(default.realm),
            client_id: std::env::var("MCIAM_IDP_CLIENT_ID").unwrap_or(default.client_id),
            certs_url: std::env::var("MCIAM_IDP_CERTS_URL").ok().filter(|s| !s.is_empty()),
            ticket_ttl_secs: env_u64("MCIAM_TICKET_TTL_SECS").unwrap_or(default.ticket_ttl_secs),
            ticket_reissue_secs: env_u64("MCIAM_TICKET_REISSUE_SECS")
                .unwrap_or(default.ticket_reissue_secs),
            http_timeout_secs: env_u64("MCIAM_HTTP_TIMEOUT_SECS").unwrap_or(default.http_timeout_secs),
        }
    }

    /// Realm URL, which is also the issuer of realm tokens.
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.idp_base_url.trim_end_matches('/'), self.realm)
    }

    /// JWKS URL.
    pub fn certs_url(&self) -> String {
        self.certs_url
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/certs", self.realm_url()))
    }

    /// OpenID Connect token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    /// Ticket lifetime.
    pub fn ticket_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ticket_ttl_secs as i64)
    }

    /// Ticket re-issue window.
    pub fn reissue_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ticket_reissue_secs as i64)
    }

    /// Identity-provider request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idp_base_url.is_empty() {
            return Err(ConfigError::MissingEnvVar("MCIAM_IDP_BASE_URL".to_string()));
        }
        if !self.idp_base_url.starts_with("http://") && !self.idp_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "MCIAM_IDP_BASE_URL".to_string(),
                message: "must be an http(s) URL".to_string(),
            });
        }
        if self.realm.is_empty() {
            return Err(ConfigError::MissingEnvVar("MCIAM_IDP_REALM".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingEnvVar("MCIAM_IDP_CLIENT_ID".to_string()));
        }
        if self.ticket_ttl_secs <= self.ticket_reissue_secs {
            return Err(ConfigError::InvalidValue {
                key: "MCIAM_TICKET_TTL_SECS".to_string(),
                message: "must be longer than the re-issue window".to_string(),
            });
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.ticket_ttl(), chrono::Duration::minutes(30));
        assert_eq!(config.reissue_window(), chrono::Duration::minutes(1));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_urls() {
        let config = AuthConfig {
            idp_base_url: "https://idp.example.com/".to_string(),
            ..Default::default()
        };

        assert_eq!(config.realm_url(), "https://idp.example.com/realms/mciam");
        assert_eq!(
            config.certs_url(),
            "https://idp.example.com/realms/mciam/protocol/openid-connect/certs"
        );
        assert_eq!(
            config.token_url(),
            "https://idp.example.com/realms/mciam/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_explicit_certs_url_wins() {
        let config = AuthConfig {
            certs_url: Some("http://127.0.0.1:9000/certs".to_string()),
            ..Default::default()
        };

        assert_eq!(config.certs_url(), "http://127.0.0.1:9000/certs");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AuthConfig {
            idp_base_url: "idp.example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let config = AuthConfig {
            ticket_ttl_secs: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuthConfig {
            client_id: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingEnvVar(_))));
    }
}
