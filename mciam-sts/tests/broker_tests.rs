//! Broker tests against mocked AWS and Alibaba STS endpoints.

use chrono::Duration as ChronoDuration;
use mciam_auth::{AuthError, IamClaims};
use mciam_org::{AuthMethod, CspRole, CspType, RoleMaster, RoleMasterCspRoleMapping, RoleType, User};
use mciam_rbac::InMemoryDirectory;
use mciam_sts::{
    AlibabaStsProvider, AwsStsProvider, CspCredentialBroker, RetryConfig, StsConfig, StsError,
    UnimplementedProvider,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WORKSPACE: u64 = 7;
const IDENTITY_TOKEN: &str = "user-id-token";
const AWS_ROLE: &str = "arn:aws:iam::123456789012:role/mciam-operator";
const ALIBABA_ROLE: &str = "acs:ram::1:role/mciam-operator";
const ALIBABA_IDP: &str = "acs:ram::1:oidc-provider/mciam";

const AWS_OK: &str = r#"<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <Credentials>
      <SessionToken>aws-session-token</SessionToken>
      <SecretAccessKey>aws-secret</SecretAccessKey>
      <Expiration>2030-01-01T00:15:00Z</Expiration>
      <AccessKeyId>ASIAMOCK</AccessKeyId>
    </Credentials>
  </AssumeRoleWithWebIdentityResult>
  <ResponseMetadata><RequestId>req-1</RequestId></ResponseMetadata>
</AssumeRoleWithWebIdentityResponse>"#;

const ALIBABA_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AssumeRoleWithOIDCResponse>
  <RequestId>req-2</RequestId>
  <Credentials>
    <SecurityToken>ali-security-token</SecurityToken>
    <Expiration>2030-01-01T00:15:00Z</Expiration>
    <AccessKeySecret>ali-secret</AccessKeySecret>
    <AccessKeyId>STS.MOCK</AccessKeyId>
  </Credentials>
</AssumeRoleWithOIDCResponse>"#;

/// Test fixture: mock STS server and a directory where alice's workspace
/// role is mapped to an AWS and an Alibaba role.
struct TestFixture {
    server: MockServer,
    config: StsConfig,
    directory: InMemoryDirectory,
}

impl TestFixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = StsConfig {
            aws_endpoint: format!("{}/aws", server.uri()),
            alibaba_endpoint: format!("{}/alibaba", server.uri()),
            timeout_secs: 5,
            ..Default::default()
        };

        let directory = InMemoryDirectory::new();
        directory.insert_user(User::new(1, "kc-alice", "alice")).await;
        directory
            .insert_role(RoleMaster::new(20, "operator", RoleType::Workspace))
            .await;
        directory.grant_workspace_role(1, WORKSPACE, 20).await;

        directory
            .insert_csp_role(CspRole::new(100, "mciam-operator", CspType::Aws, AWS_ROLE))
            .await;
        directory
            .insert_csp_role(
                CspRole::new(200, "mciam-operator", CspType::Alibaba, ALIBABA_ROLE)
                    .with_idp_identifier(ALIBABA_IDP),
            )
            .await;
        directory
            .insert_csp_mapping(RoleMasterCspRoleMapping::new(20, AuthMethod::Oidc, CspType::Aws, 100))
            .await
            .unwrap();
        directory
            .insert_csp_mapping(RoleMasterCspRoleMapping::new(20, AuthMethod::Oidc, CspType::Alibaba, 200))
            .await
            .unwrap();

        Self {
            server,
            config,
            directory,
        }
    }

    fn broker(&self) -> CspCredentialBroker {
        CspCredentialBroker::from_config(Arc::new(self.directory.clone()), &self.config).unwrap()
    }

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            exponential_base: 2.0,
        }
    }

    fn claims() -> IamClaims {
        IamClaims::new("kc-alice", "alice", ChronoDuration::minutes(5))
    }

    async fn mount_aws(&self, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/aws"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    async fn mount_alibaba(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/alibaba"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn test_two_mapped_one_unmapped() {
    let fixture = TestFixture::new().await;
    fixture.mount_aws(ResponseTemplate::new(200).set_body_string(AWS_OK)).await;
    fixture
        .mount_alibaba(ResponseTemplate::new(200).set_body_string(ALIBABA_OK))
        .await;

    let response = fixture
        .broker()
        .get_credentials(
            IDENTITY_TOKEN,
            &TestFixture::claims(),
            WORKSPACE,
            &[CspType::Aws, CspType::Alibaba, CspType::Gcp],
        )
        .await
        .unwrap();

    assert_eq!(response.csp_credentials.len(), 2);
    assert_eq!(response.unsupported_providers, vec![CspType::Gcp]);
    assert!(response.failed_providers.is_empty());

    let aws = response.credential_for(CspType::Aws).unwrap();
    assert_eq!(aws.access_key_id, "ASIAMOCK");
    assert_eq!(aws.session_token, "aws-session-token");

    let alibaba = response.credential_for(CspType::Alibaba).unwrap();
    assert_eq!(alibaba.access_key_id, "STS.MOCK");
    assert_eq!(alibaba.secret_access_key, "ali-secret");
    assert_eq!(alibaba.session_token, "ali-security-token");
}

#[tokio::test]
async fn test_aws_request_shape() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/aws"))
        .and(query_param("Action", "AssumeRoleWithWebIdentity"))
        .and(query_param("Version", "2011-06-15"))
        .and(query_param("DurationSeconds", "900"))
        .and(query_param("RoleArn", AWS_ROLE))
        .and(query_param("WebIdentityToken", IDENTITY_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(AWS_OK))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let response = fixture
        .broker()
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Aws])
        .await
        .unwrap();

    assert!(response.is_complete());

    let requests = fixture.server.received_requests().await.unwrap();
    let session = requests[0]
        .url
        .query_pairs()
        .find(|(key, _)| key == "RoleSessionName")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    assert!(session.starts_with("mciam-alice-"));
}

#[tokio::test]
async fn test_alibaba_request_shape() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/alibaba"))
        .and(header("x-acs-action", "AssumeRoleWithOIDC"))
        .and(header("x-acs-version", "2015-04-01"))
        .and(body_string_contains("OIDCProviderArn=acs%3Aram%3A%3A1%3Aoidc-provider%2Fmciam"))
        .and(body_string_contains("OIDCToken=user-id-token"))
        .and(body_string_contains("RoleSessionName=alice"))
        .and(body_string_contains("Timestamp="))
        .respond_with(ResponseTemplate::new(200).set_body_string(ALIBABA_OK))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let response = fixture
        .broker()
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Alibaba])
        .await
        .unwrap();

    assert_eq!(response.csp_credentials.len(), 1);
    assert_eq!(response.csp_credentials[0].provider, CspType::Alibaba);
}

#[tokio::test]
async fn test_aws_access_denied_is_surfaced_without_retry() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/aws"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let err = fixture
        .broker()
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Aws])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("AccessDenied"));
    match &err {
        StsError::NoProviderResolved { failed, .. } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].provider, CspType::Aws);
            assert!(failed[0].reason.contains("403"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let auth: AuthError = err.into();
    assert_eq!(auth.status_code(), 502);
    assert!(auth.to_string().contains("AccessDenied"));
}

#[tokio::test]
async fn test_partial_failure_keeps_successes() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_aws(ResponseTemplate::new(500).set_body_string("InternalFailure"))
        .await;
    fixture
        .mount_alibaba(ResponseTemplate::new(200).set_body_string(ALIBABA_OK))
        .await;

    let response = fixture
        .broker()
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Aws, CspType::Alibaba])
        .await
        .unwrap();

    assert_eq!(response.csp_credentials.len(), 1);
    assert!(response.unsupported_providers.is_empty());
    assert_eq!(response.failed_providers.len(), 1);
    assert_eq!(response.failed_providers[0].provider, CspType::Aws);
    assert!(response.failed_providers[0].reason.contains("InternalFailure"));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_aws(
            ResponseTemplate::new(200)
                .set_body_string(AWS_OK)
                .set_delay(Duration::from_secs(2)),
        )
        .await;
    fixture
        .mount_alibaba(ResponseTemplate::new(200).set_body_string(ALIBABA_OK))
        .await;

    let broker = fixture.broker().with_call_timeout(Duration::from_millis(200));
    let response = broker
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Aws, CspType::Alibaba])
        .await
        .unwrap();

    assert_eq!(response.csp_credentials.len(), 1);
    assert_eq!(response.failed_providers[0].provider, CspType::Aws);
    assert!(response.failed_providers[0].reason.contains("timed out"));
}

#[tokio::test]
async fn test_sole_provider_timeout_is_an_error() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_alibaba(
            ResponseTemplate::new(200)
                .set_body_string(ALIBABA_OK)
                .set_delay(Duration::from_secs(2)),
        )
        .await;

    let broker = fixture.broker().with_call_timeout(Duration::from_millis(200));
    let err = broker
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Alibaba])
        .await
        .unwrap_err();

    assert!(matches!(err, StsError::NoProviderResolved { .. }));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_connection_failure_is_retried_then_reported() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_alibaba(ResponseTemplate::new(200).set_body_string(ALIBABA_OK))
        .await;

    // Nothing listens on the discard port
    let unreachable = StsConfig {
        aws_endpoint: "http://127.0.0.1:9/aws".to_string(),
        ..fixture.config.clone()
    };
    let broker = CspCredentialBroker::new(Arc::new(fixture.directory.clone()))
        .with_provider(Arc::new(
            AwsStsProvider::new(&unreachable).unwrap().with_retry(TestFixture::quick_retry()),
        ))
        .with_provider(Arc::new(
            AlibabaStsProvider::new(&fixture.config)
                .unwrap()
                .with_retry(TestFixture::quick_retry()),
        ));

    let response = broker
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[])
        .await
        .unwrap();

    assert_eq!(response.csp_credentials.len(), 1);
    assert_eq!(response.failed_providers.len(), 1);
    assert!(response.failed_providers[0].reason.contains("HTTP error"));
    assert!(!response.failed_providers[0].reason.contains(IDENTITY_TOKEN));
}

#[tokio::test]
async fn test_placeholders_are_unsupported_not_denied() {
    let fixture = TestFixture::new().await;
    fixture.mount_aws(ResponseTemplate::new(200).set_body_string(AWS_OK)).await;

    fixture
        .directory
        .insert_csp_role(CspRole::new(300, "mciam-operator", CspType::Azure, "azure-app-role"))
        .await;
    fixture
        .directory
        .insert_csp_mapping(RoleMasterCspRoleMapping::new(20, AuthMethod::Oidc, CspType::Azure, 300))
        .await
        .unwrap();

    let broker = CspCredentialBroker::new(Arc::new(fixture.directory.clone()))
        .with_provider(Arc::new(AwsStsProvider::new(&fixture.config).unwrap()))
        .with_provider(Arc::new(UnimplementedProvider::new(CspType::Azure)));

    let response = broker
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Azure, CspType::Aws])
        .await
        .unwrap();

    assert_eq!(response.csp_credentials.len(), 1);
    assert_eq!(response.unsupported_providers, vec![CspType::Azure]);
    assert!(response.failed_providers.is_empty());
}

#[tokio::test]
async fn test_response_json_shape() {
    let fixture = TestFixture::new().await;
    fixture.mount_aws(ResponseTemplate::new(200).set_body_string(AWS_OK)).await;

    let response = fixture
        .broker()
        .get_credentials(IDENTITY_TOKEN, &TestFixture::claims(), WORKSPACE, &[CspType::Aws, CspType::Gcp])
        .await
        .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["cspCredentials"][0]["provider"], "aws");
    assert_eq!(json["cspCredentials"][0]["credential"]["accessKeyId"], "ASIAMOCK");
    assert_eq!(json["unsupportedProviders"][0], "gcp");
    assert!(json.get("failedProviders").is_none());
}
