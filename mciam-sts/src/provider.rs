//! Per-provider credential exchange seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mciam_org::{AuthMethod, CspType};
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::credential::CspCredential;
use crate::error::{StsError, StsResult};

/// Longest session name either provider accepts.
pub const MAX_SESSION_NAME_LEN: usize = 64;

/// Input of one credential exchange.
#[derive(Clone)]
pub struct FederationRequest {
    /// Caller's identity token, passed to the provider as-is
    pub identity_token: String,

    /// Caller's login name, used for the provider session name
    pub username: String,

    /// Target role in the provider
    pub role_arn: String,

    /// Identity-provider connection the target role trusts
    pub idp_identifier: Option<String>,
}

impl FederationRequest {
    pub fn new(
        identity_token: impl Into<String>,
        username: impl Into<String>,
        role_arn: impl Into<String>,
    ) -> Self {
        Self {
            identity_token: identity_token.into(),
            username: username.into(),
            role_arn: role_arn.into(),
            idp_identifier: None,
        }
    }

    pub fn with_idp_identifier(mut self, idp_identifier: Option<String>) -> Self {
        self.idp_identifier = idp_identifier;
        self
    }
}

impl fmt::Debug for FederationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederationRequest")
            .field("identity_token", &"[REDACTED]")
            .field("username", &self.username)
            .field("role_arn", &self.role_arn)
            .field("idp_identifier", &self.idp_identifier)
            .finish()
    }
}

/// Exchanges an identity token for temporary credentials in one cloud.
///
/// `Ok(None)` means the provider has no exchange to offer yet; the broker
/// reports it as unsupported, not as a denial.
#[async_trait]
pub trait CspCredentialProvider: Send + Sync {
    /// Cloud this provider serves.
    fn csp_type(&self) -> CspType;

    /// Check that the provider is configured to serve `request`.
    ///
    /// Runs before any call goes out. An error here is a configuration gap,
    /// and the broker reports the provider as unsupported.
    fn check_request(&self, _request: &FederationRequest) -> StsResult<()> {
        Ok(())
    }

    /// Run the exchange.
    async fn exchange(&self, request: &FederationRequest) -> StsResult<Option<CspCredential>>;
}

/// Catalogue entry: a cloud and the federation methods it supports.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SupportedProvider {
    pub provider: CspType,
    pub methods: Vec<AuthMethod>,
}

/// Clouds and federation methods the platform supports.
pub fn supported_providers() -> Vec<SupportedProvider> {
    vec![
        SupportedProvider {
            provider: CspType::Aws,
            methods: vec![AuthMethod::Oidc, AuthMethod::Saml],
        },
        SupportedProvider {
            provider: CspType::Gcp,
            methods: vec![AuthMethod::Oidc],
        },
        SupportedProvider {
            provider: CspType::Alibaba,
            methods: vec![AuthMethod::Oidc],
        },
    ]
}

/// Placeholder for a cloud whose exchange is not built yet.
///
/// Always answers `Ok(None)`.
#[derive(Debug, Clone, Copy)]
pub struct UnimplementedProvider {
    csp_type: CspType,
}

impl UnimplementedProvider {
    pub fn new(csp_type: CspType) -> Self {
        Self { csp_type }
    }
}

#[async_trait]
impl CspCredentialProvider for UnimplementedProvider {
    fn csp_type(&self) -> CspType {
        self.csp_type
    }

    async fn exchange(&self, _request: &FederationRequest) -> StsResult<Option<CspCredential>> {
        Ok(None)
    }
}

/// Replace characters a provider rejects in a session name with `-` and
/// cap the length.
///
/// Word characters and `extra` are kept.
pub(crate) fn sanitize_session_name(raw: &str, extra: &[char]) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || extra.contains(&c) {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SESSION_NAME_LEN)
        .collect()
}

/// Return the body of a success response, or the provider's status and
/// body text verbatim.
pub(crate) async fn read_body(provider: CspType, response: reqwest::Response) -> StsResult<String> {
    let status = response.status();

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Unknown error").to_string());
        warn!(provider = %provider, status = status.as_u16(), "STS call rejected");
        return Err(StsError::ProviderStatus {
            provider,
            status: status.as_u16(),
            message,
        });
    }

    response.text().await.map_err(|e| StsError::Http(e.without_url()))
}

/// Parse an ISO-8601 expiration timestamp.
pub(crate) fn parse_expiration(raw: &str) -> StsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StsError::InvalidResponse(format!("bad Expiration '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue() {
        let catalogue = supported_providers();
        assert_eq!(catalogue.len(), 3);

        let aws = catalogue.iter().find(|p| p.provider == CspType::Aws).unwrap();
        assert!(aws.methods.contains(&AuthMethod::Saml));
        assert!(!catalogue.iter().any(|p| p.provider == CspType::Azure));
    }

    #[test]
    fn test_request_debug_redacts_token() {
        let request = FederationRequest::new("eyJhbGciOi.secret", "alice", "arn:aws:iam::1:role/r");
        let debug = format!("{:?}", request);
        assert!(!debug.contains("eyJhbGciOi"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn test_sanitize_session_name() {
        assert_eq!(sanitize_session_name("alice smith", &['.']), "alice-smith");
        assert_eq!(sanitize_session_name("a+b=c", &['+', '=']), "a+b=c");
        assert_eq!(sanitize_session_name("a+b", &[]), "a-b");
        assert_eq!(sanitize_session_name(&"x".repeat(80), &[]).len(), MAX_SESSION_NAME_LEN);
    }

    #[test]
    fn test_parse_expiration() {
        let at = parse_expiration("2030-01-02T03:04:05Z").unwrap();
        assert_eq!(at.to_rfc3339(), "2030-01-02T03:04:05+00:00");
        assert!(matches!(parse_expiration("tomorrow"), Err(StsError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_placeholder_returns_nothing() {
        let provider = UnimplementedProvider::new(CspType::Azure);
        let request = FederationRequest::new("token", "alice", "role");

        assert_eq!(provider.csp_type(), CspType::Azure);
        assert!(provider.exchange(&request).await.unwrap().is_none());
    }
}
