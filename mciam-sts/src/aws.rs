//! AWS `AssumeRoleWithWebIdentity` federation.
//!
//! The caller's identity token is exchanged for a key pair and session
//! token through a GET with query parameters. AWS answers in XML:
//!
//! ```text
//! AssumeRoleWithWebIdentityResponse
//!   └─ AssumeRoleWithWebIdentityResult
//!        └─ Credentials { AccessKeyId, SecretAccessKey, SessionToken, Expiration }
//! ```

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

pub const AWS_STS_ACTION: &str = "AssumeRoleWithWebIdentity";
pub const AWS_STS_VERSION: &str = "2011-06-15";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResponse {
    assume_role_with_web_identity_result: AssumeRoleWithWebIdentityResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResult {
    credentials: AwsCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Session name `mciam-<username>-<unix seconds>`, limited to the
/// characters and length AWS accepts.
pub fn session_name(username: &str, unix_secs: i64) -> String {
    sanitize_session_name(&format!("mciam-{username}-{unix_secs}"), &['+', '=', ',', '.', '@', '-'])
}

/// Parse an `AssumeRoleWithWebIdentity` XML body.
pub fn parse_response(body: &str) -> StsResult<CspCredential> {
    let parsed: AssumeRoleWithWebIdentityResponse = quick_xml::de::from_str(body)
        .map_err(|e| StsError::InvalidResponse(format!("AssumeRoleWithWebIdentity: {e}")))?;
    let credentials = parsed.assume_role_with_web_identity_result.credentials;

    Ok(CspCredential {
        csp_type: CspType::Aws,
        expiration: parse_expiration(&credentials.expiration)?,
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.secret_access_key,
        session_token: credentials.session_token,
    })
}

/// AWS STS web-identity provider.
#[derive(Clone)]
pub struct AwsStsProvider {
    client: Client,
    endpoint: String,
    duration_secs: u32,
    retry: RetryConfig,
}

impl AwsStsProvider {
    /// Create a provider from the STS configuration.
    pub fn new(config: &StsConfig) -> StsResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StsError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.aws_endpoint.clone(),
            duration_secs: config.duration_secs,
            retry: config.retry(),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn assume_role(&self, request: &FederationRequest, session: &str) -> StsResult<CspCredential> {
        let duration = self.duration_secs.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("Action", AWS_STS_ACTION),
                ("Version", AWS_STS_VERSION),
                ("DurationSeconds", duration.as_str()),
                ("RoleSessionName", session),
                ("RoleArn", request.role_arn.as_str()),
                ("WebIdentityToken", request.identity_token.as_str()),
            ])
            .send()
            .await
            // The query string carries the identity token
            .map_err(|e| StsError::Http(e.without_url()))?;

        let body = read_body(CspType::Aws, response).await?;
        parse_response(&body)
    }
}

#[async_trait]
impl CspCredentialProvider for AwsStsProvider {
    fn csp_type(&self) -> CspType {
        CspType::Aws
    }

    #[instrument(skip(self, request), fields(role_arn = %request.role_arn))]
    async fn exchange(&self, request: &FederationRequest) -> StsResult<Option<CspCredential>> {
        let session = session_name(&request.username, Utc::now().timestamp());
        debug!(session = %session, "Assuming AWS role with web identity");

        let credential = with_retry_if(
            &self.retry,
            || self.assume_role(request, &session),
            StsError::is_transport,
        )
        .await?;

        debug!(expiration = %credential.expiration, "AWS credentials issued");
        Ok(Some(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <SubjectFromWebIdentityToken>0b5c-kc-subject</SubjectFromWebIdentityToken>
    <Audience>mciam-client</Audience>
    <AssumedRoleUser>
      <Arn>arn:aws:sts::123456789012:assumed-role/mciam-operator/mciam-alice-1700000000</Arn>
      <AssumedRoleId>AROACLKWSDQRAOEXAMPLE:mciam-alice-1700000000</AssumedRoleId>
    </AssumedRoleUser>
    <Credentials>
      <SessionToken>AQoDYXdzEE0a8ANXXXXXXXXNO1ewxE5TijQyp</SessionToken>
      <SecretAccessKey>wJalrXUtnFEMI/K7MDENG/bPxRfiCYzEXAMPLEKEY</SecretAccessKey>
      <Expiration>2030-10-24T23:00:23Z</Expiration>
      <AccessKeyId>ASgeIAIOSFODNN7EXAMPLE</AccessKeyId>
    </Credentials>
    <Provider>keycloak</Provider>
  </AssumeRoleWithWebIdentityResult>
  <ResponseMetadata>
    <RequestId>ad4156e9-bce1-11e2-82e6-6b6efEXAMPLE</RequestId>
  </ResponseMetadata>
</AssumeRoleWithWebIdentityResponse>"#;

    #[test]
    fn test_parse_response() {
        let credential = parse_response(RESPONSE).unwrap();

        assert_eq!(credential.csp_type, CspType::Aws);
        assert_eq!(credential.access_key_id, "ASgeIAIOSFODNN7EXAMPLE");
        assert_eq!(credential.secret_access_key, "wJalrXUtnFEMI/K7MDENG/bPxRfiCYzEXAMPLEKEY");
        assert_eq!(credential.session_token, "AQoDYXdzEE0a8ANXXXXXXXXNO1ewxE5TijQyp");
        assert_eq!(credential.expiration.to_rfc3339(), "2030-10-24T23:00:23+00:00");
    }

    #[test]
    fn test_parse_response_without_credentials() {
        let body = "<AssumeRoleWithWebIdentityResponse><AssumeRoleWithWebIdentityResult/></AssumeRoleWithWebIdentityResponse>";
        assert!(matches!(parse_response(body), Err(StsError::InvalidResponse(_))));
    }

    #[test]
    fn test_session_name() {
        assert_eq!(session_name("alice", 1_700_000_000), "mciam-alice-1700000000");
        assert_eq!(session_name("bob smith", 1), "mciam-bob-smith-1");

        let long = session_name(&"u".repeat(100), 1_700_000_000);
        assert_eq!(long.len(), 64);
        assert!(long.starts_with("mciam-uuu"));
    }
}
