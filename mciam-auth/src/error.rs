//! Error types for authentication and authorization
//!
//! This module defines every error the token validator, the permission gate
//! and the ticket service can return, together with the HTTP status each
//! one maps to.

use mciam_rbac::{RbacError, RepositoryError};
use thiserror::Error;

/// Authentication and authorization error types.
///
/// Statuses follow one rule: a bad credential is 401, a valid identity
/// without the needed grant is 403, a well-signed but mis-shaped claim is
/// 400, and store failures are 503 so callers can tell "try again" from
/// "not allowed".
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be parsed (bad segments, base64 or JSON)
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Token `kid` is not present in the loaded key set
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    /// Signature, algorithm, issuer or not-before check failed
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is valid but lacks a claim the operation needs
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// No validated identity on the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity is valid but lacks the required role or permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Claim present but shaped wrongly (e.g. ticket `rsname` mismatch)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Upstream identity or cloud provider rejected the call
    #[error("{provider} error: {message}")]
    ExternalProvider {
        /// Provider name (`keycloak`, `aws`, `alibaba`, ...)
        provider: String,
        /// Raw provider text, verbatim
        message: String,
    },

    /// Public key set could not be fetched or parsed
    #[error("Key set fetch failed: {0}")]
    KeySetFetch(String),

    /// Service is missing configuration it needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Role / permission / ticket store failure
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// Internal error, including data-consistency problems
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Shorthand for an [`AuthError::ExternalProvider`].
    pub fn external(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::ExternalProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Check if this error should be logged at error level.
    ///
    /// Rejected tokens and denied permissions are expected traffic and
    /// are not server errors.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Whether the same request may succeed if retried unchanged.
    ///
    /// Authentication and ticket-shape errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Infrastructure(_) | AuthError::KeySetFetch(_))
    }

    /// Whether this is an authentication failure (401).
    pub fn is_authentication_error(&self) -> bool {
        self.status_code() == 401
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MalformedToken(_)
            | AuthError::UnknownKey(_)
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::Unauthenticated(_) => 401,

            AuthError::Forbidden(_) => 403,

            AuthError::MissingClaim(_) | AuthError::Validation(_) => 400,

            AuthError::ExternalProvider { .. } => 502,

            AuthError::KeySetFetch(_) | AuthError::Infrastructure(_) => 503,

            AuthError::Configuration(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "MALFORMED_TOKEN",
            AuthError::UnknownKey(_) => "UNKNOWN_KEY",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::MissingClaim(_) => "MISSING_CLAIM",
            AuthError::Unauthenticated(_) => "UNAUTHENTICATED",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::ExternalProvider { .. } => "EXTERNAL_PROVIDER_ERROR",
            AuthError::KeySetFetch(_) => "KEY_SET_UNAVAILABLE",
            AuthError::Configuration(_) => "CONFIG_ERROR",
            AuthError::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        AuthError::Infrastructure(err.to_string())
    }
}

impl From<RbacError> for AuthError {
    fn from(err: RbacError) -> Self {
        match err {
            // Identity was validated, so a missing record is a data problem
            RbacError::UserNotFound(subject) => {
                AuthError::Internal(format!("no local user for subject {subject}"))
            }
            RbacError::Repository(inner) => inner.into(),
        }
    }
}
