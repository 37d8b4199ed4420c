//! Error types for STS federation calls

use mciam_auth::AuthError;
use mciam_org::CspType;
use mciam_rbac::RepositoryError;
use std::time::Duration;
use thiserror::Error;

use crate::credential::FailedProvider;

/// Errors from a credential exchange.
#[derive(Debug, Error)]
pub enum StsError {
    /// HTTP transport failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{provider} STS returned {status}: {message}")]
    ProviderStatus {
        /// Provider that answered
        provider: CspType,
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        message: String,
    },

    /// Response body could not be parsed
    #[error("Invalid STS response: {0}")]
    InvalidResponse(String),

    /// Call exceeded the per-call budget
    #[error("{provider} STS call timed out after {after:?}")]
    Timeout {
        /// Provider that was called
        provider: CspType,
        /// Budget that elapsed
        after: Duration,
    },

    /// Provider or role is missing configuration the exchange needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller has no local user record
    #[error("Unknown user")]
    UnknownUser,

    /// Caller's account is disabled
    #[error("User is disabled")]
    UserDisabled,

    /// No requested provider produced credentials
    #[error("No provider produced credentials (unsupported: {}; failed: {})", display_unsupported(.unsupported), display_failed(.failed))]
    NoProviderResolved {
        /// Providers without a mapping or implementation
        unsupported: Vec<CspType>,
        /// Providers whose exchange failed, with the reason
        failed: Vec<FailedProvider>,
    },

    /// Role store read failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result type for STS operations.
pub type StsResult<T> = Result<T, StsError>;

impl StsError {
    /// Whether this is a transport failure worth another attempt.
    ///
    /// A status answer from the provider is final: the same token and role
    /// will be refused again.
    pub fn is_transport(&self) -> bool {
        match self {
            StsError::Http(e) => e.is_connect() || e.is_timeout(),
            StsError::Timeout { .. } => true,
            _ => false,
        }
    }
}

fn display_unsupported(providers: &[CspType]) -> String {
    if providers.is_empty() {
        return "none".to_string();
    }
    providers
        .iter()
        .map(CspType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_failed(failed: &[FailedProvider]) -> String {
    if failed.is_empty() {
        return "none".to_string();
    }
    failed
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<StsError> for AuthError {
    fn from(err: StsError) -> Self {
        match err {
            StsError::ProviderStatus { provider, .. } | StsError::Timeout { provider, .. } => {
                AuthError::external(provider.as_str(), err.to_string())
            }
            StsError::Http(_) | StsError::InvalidResponse(_) | StsError::NoProviderResolved { .. } => {
                AuthError::external("sts", err.to_string())
            }
            StsError::Configuration(message) => AuthError::Configuration(message),
            StsError::UnknownUser => AuthError::Internal("no local user for caller".to_string()),
            StsError::UserDisabled => AuthError::Forbidden("user is disabled".to_string()),
            StsError::Repository(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_keeps_body() {
        let err = StsError::ProviderStatus {
            provider: CspType::Aws,
            status: 403,
            message: "AccessDenied".to_string(),
        };
        assert_eq!(err.to_string(), "aws STS returned 403: AccessDenied");
        assert!(!err.is_transport());

        let auth: AuthError = err.into();
        assert_eq!(auth.status_code(), 502);
        assert!(auth.to_string().contains("AccessDenied"));
    }

    #[test]
    fn test_no_provider_resolved_lists_reasons() {
        let err = StsError::NoProviderResolved {
            unsupported: vec![CspType::Gcp],
            failed: vec![FailedProvider {
                provider: CspType::Aws,
                reason: "aws STS returned 403: AccessDenied".to_string(),
            }],
        };
        let message = err.to_string();
        assert!(message.contains("unsupported: gcp"));
        assert!(message.contains("AccessDenied"));

        let auth: AuthError = err.into();
        assert_eq!(auth.error_code(), "EXTERNAL_PROVIDER_ERROR");
    }

    #[test]
    fn test_timeout_is_transport() {
        let err = StsError::Timeout {
            provider: CspType::Alibaba,
            after: Duration::from_secs(3),
        };
        assert!(err.is_transport());
    }

    #[test]
    fn test_user_errors_map_to_auth_taxonomy() {
        assert_eq!(AuthError::from(StsError::UserDisabled).status_code(), 403);
        assert_eq!(AuthError::from(StsError::UnknownUser).status_code(), 500);

        let repo = StsError::from(RepositoryError::Unavailable("db down".to_string()));
        assert!(AuthError::from(repo).is_retryable());
    }
}
