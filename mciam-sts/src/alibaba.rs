//! Alibaba Cloud `AssumeRoleWithOIDC` federation.
//!
//! A form-encoded POST with the `x-acs-action` / `x-acs-version` headers.
//! The OIDC provider ARN comes from the CSP role's identity-provider
//! connection, falling back to the configured one.

use async_trait::async_trait;
use chrono::Utc;
use mciam_org::CspType;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::StsConfig;
use crate::credential::CspCredential;
use crate::error::{StsError, StsResult};
use crate::provider::{parse_expiration, read_body, sanitize_session_name, CspCredentialProvider, FederationRequest};
use crate::retry::{with_retry_if, RetryConfig};

pub const ALIBABA_STS_ACTION: &str = "AssumeRoleWithOIDC";
pub const ALIBABA_STS_VERSION: &str = "2015-04-01";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleWithOidcResponse {
    credentials: AlibabaCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AlibabaCredentials {
    security_token: String,
    access_key_id: String,
    access_key_secret: String,
    expiration: String,
}

impl std::fmt::Debug for AlibabaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlibabaCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Parse an `AssumeRoleWithOIDC` XML body.
pub fn parse_response(body: &str) -> StsResult<CspCredential> {
    let parsed: AssumeRoleWithOidcResponse = quick_xml::de::from_str(body)
        .map_err(|e| StsError::InvalidResponse(format!("AssumeRoleWithOIDC: {e}")))?;
    let credentials = parsed.credentials;

    Ok(CspCredential {
        csp_type: CspType::Alibaba,
        expiration: parse_expiration(&credentials.expiration)?,
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.access_key_secret,
        session_token: credentials.security_token,
    })
}

/// Alibaba Cloud STS OIDC provider.
#[derive(Clone)]
pub struct AlibabaStsProvider {
    client: Client,
    endpoint: String,
    oidc_provider_arn: Option<String>,
    duration_secs: u32,
    retry: RetryConfig,
}

impl AlibabaStsProvider {
    /// Create a provider from the STS configuration.
    pub fn new(config: &StsConfig) -> StsResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StsError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.alibaba_endpoint.clone(),
            oidc_provider_arn: config.alibaba_oidc_provider_arn.clone(),
            duration_secs: config.duration_secs,
            retry: config.retry(),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn provider_arn<'a>(&'a self, request: &'a FederationRequest) -> StsResult<&'a str> {
        request
            .idp_identifier
            .as_deref()
            .filter(|arn| !arn.is_empty())
            .or_else(|| self.oidc_provider_arn.as_deref().filter(|arn| !arn.is_empty()))
            .ok_or_else(|| {
                StsError::Configuration(format!(
                    "no OIDC provider ARN for Alibaba role {}",
                    request.role_arn
                ))
            })
    }

    async fn assume_role(
        &self,
        request: &FederationRequest,
        provider_arn: &str,
        session: &str,
    ) -> StsResult<CspCredential> {
        let duration = self.duration_secs.to_string();
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-acs-action", ALIBABA_STS_ACTION)
            .header("x-acs-version", ALIBABA_STS_VERSION)
            .form(&[
                ("OIDCProviderArn", provider_arn),
                ("RoleArn", request.role_arn.as_str()),
                ("OIDCToken", request.identity_token.as_str()),
                ("RoleSessionName", session),
                ("DurationSeconds", duration.as_str()),
                ("Timestamp", timestamp.as_str()),
                ("Format", "XML"),
            ])
            .send()
            .await
            .map_err(StsError::Http)?;

        let body = read_body(CspType::Alibaba, response).await?;
        parse_response(&body)
    }
}

#[async_trait]
impl CspCredentialProvider for AlibabaStsProvider {
    fn csp_type(&self) -> CspType {
        CspType::Alibaba
    }

    fn check_request(&self, request: &FederationRequest) -> StsResult<()> {
        self.provider_arn(request).map(|_| ())
    }

    #[instrument(skip(self, request), fields(role_arn = %request.role_arn))]
    async fn exchange(&self, request: &FederationRequest) -> StsResult<Option<CspCredential>> {
        let provider_arn = self.provider_arn(request)?;
        let session = sanitize_session_name(&request.username, &['.', '@', '-']);
        debug!(session = %session, "Assuming Alibaba role with OIDC");

        let credential = with_retry_if(
            &self.retry,
            || self.assume_role(request, provider_arn, &session),
            StsError::is_transport,
        )
        .await?;

        debug!(expiration = %credential.expiration, "Alibaba credentials issued");
        Ok(Some(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AssumeRoleWithOIDCResponse>
  <RequestId>3D57EAD2-8723-1F26-B69C-F8707D8B565D</RequestId>
  <OIDCTokenInfo>
    <Subject>0b5c-kc-subject</Subject>
    <Issuer>https://idp.example.com/realms/mciam</Issuer>
  </OIDCTokenInfo>
  <AssumedRoleUser>
    <AssumedRoleId>33157794895460****</AssumedRoleId>
    <Arn>acs:ram::113511544585****:role/mciam-operator/alice</Arn>
  </AssumedRoleUser>
  <Credentials>
    <SecurityToken>CAIShwJ1q6Ft5B2yfSjIr5bSEsj4</SecurityToken>
    <Expiration>2030-10-19T04:27:09Z</Expiration>
    <AccessKeySecret>CVwjCkNzTMupZ8NbTCxCBRq3K16jtcWFTJAyBEv2****</AccessKeySecret>
    <AccessKeyId>STS.NTZdvrB7MbaMK6B8WEzDM****</AccessKeyId>
  </Credentials>
</AssumeRoleWithOIDCResponse>"#;

    fn provider(fallback: Option<&str>) -> AlibabaStsProvider {
        AlibabaStsProvider::new(&StsConfig {
            alibaba_oidc_provider_arn: fallback.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_response() {
        let credential = parse_response(RESPONSE).unwrap();

        assert_eq!(credential.csp_type, CspType::Alibaba);
        assert_eq!(credential.access_key_id, "STS.NTZdvrB7MbaMK6B8WEzDM****");
        assert_eq!(credential.secret_access_key, "CVwjCkNzTMupZ8NbTCxCBRq3K16jtcWFTJAyBEv2****");
        assert_eq!(credential.session_token, "CAIShwJ1q6Ft5B2yfSjIr5bSEsj4");
        assert_eq!(credential.expiration.to_rfc3339(), "2030-10-19T04:27:09+00:00");
    }

    #[test]
    fn test_provider_arn_prefers_role() {
        let request = FederationRequest::new("token", "alice", "acs:ram::1:role/r")
            .with_idp_identifier(Some("acs:ram::1:oidc-provider/role-idp".to_string()));

        let alibaba = provider(Some("acs:ram::1:oidc-provider/fallback"));
        assert_eq!(alibaba.provider_arn(&request).unwrap(), "acs:ram::1:oidc-provider/role-idp");

        let request = FederationRequest::new("token", "alice", "acs:ram::1:role/r");
        assert_eq!(alibaba.provider_arn(&request).unwrap(), "acs:ram::1:oidc-provider/fallback");
    }

    #[tokio::test]
    async fn test_missing_provider_arn_is_configuration_error() {
        let request = FederationRequest::new("token", "alice", "acs:ram::1:role/r");
        let alibaba = provider(None);

        assert!(matches!(alibaba.check_request(&request), Err(StsError::Configuration(_))));
        assert!(matches!(alibaba.exchange(&request).await, Err(StsError::Configuration(_))));

        let request = request.with_idp_identifier(Some("acs:ram::1:oidc-provider/role-idp".to_string()));
        assert!(alibaba.check_request(&request).is_ok());
    }
}
