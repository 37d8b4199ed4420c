//! Normalized temporary credentials and the aggregated broker response

use chrono::{DateTime, Utc};
use mciam_org::CspType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Temporary credentials issued by one cloud provider.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CspCredential {
    /// Issuing provider
    pub csp_type: CspType,

    /// Access key id
    pub access_key_id: String,

    /// Secret access key
    pub secret_access_key: String,

    /// Session token bound to the key pair
    pub session_token: String,

    /// When the credentials stop working
    pub expiration: DateTime<Utc>,
}

impl CspCredential {
    /// Whether the credentials have expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiration
    }
}

impl fmt::Debug for CspCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CspCredential")
            .field("csp_type", &self.csp_type)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// One entry of `cspCredentials`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderCredential {
    /// Provider the credential belongs to
    pub provider: CspType,

    /// Issued credential
    pub credential: CspCredential,
}

/// A provider whose exchange failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedProvider {
    /// Failed provider
    pub provider: CspType,

    /// Failure text, including any provider body
    pub reason: String,
}

/// Aggregated result of a multi-provider exchange.
///
/// Providers are reported in request order within each list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    /// Issued credentials
    pub csp_credentials: Vec<ProviderCredential>,

    /// Providers with no mapping, no CSP role or no implementation
    pub unsupported_providers: Vec<CspType>,

    /// Providers that were attempted and failed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_providers: Vec<FailedProvider>,
}

impl CredentialResponse {
    /// Credential issued by a provider, if any.
    pub fn credential_for(&self, provider: CspType) -> Option<&CspCredential> {
        self.csp_credentials
            .iter()
            .find(|entry| entry.provider == provider)
            .map(|entry| &entry.credential)
    }

    /// Whether every requested provider produced credentials.
    pub fn is_complete(&self) -> bool {
        self.unsupported_providers.is_empty() && self.failed_providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credential() -> CspCredential {
        CspCredential {
            csp_type: CspType::Aws,
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
            session_token: "FwoGZXIvYXdzE".to_string(),
            expiration: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", credential());
        assert!(debug.contains("ASIAEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(!debug.contains("FwoGZXIvYXdzE"));
    }

    #[test]
    fn test_response_wire_shape() {
        let response = CredentialResponse {
            csp_credentials: vec![ProviderCredential {
                provider: CspType::Aws,
                credential: credential(),
            }],
            unsupported_providers: vec![CspType::Gcp],
            failed_providers: vec![],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["cspCredentials"][0]["provider"], "aws");
        assert_eq!(json["cspCredentials"][0]["credential"]["accessKeyId"], "ASIAEXAMPLE");
        assert_eq!(json["cspCredentials"][0]["credential"]["cspType"], "aws");
        assert_eq!(json["unsupportedProviders"][0], "gcp");
        assert!(json.get("failedProviders").is_none());
        assert!(!response.is_complete());
        assert!(response.credential_for(CspType::Aws).is_some());
        assert!(response.credential_for(CspType::Alibaba).is_none());
    }

    #[test]
    fn test_failed_providers_serialized_when_present() {
        let response = CredentialResponse {
            failed_providers: vec![FailedProvider {
                provider: CspType::Alibaba,
                reason: "timed out".to_string(),
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["failedProviders"][0]["provider"], "alibaba");
    }
}
