//! Workspace ticket issuers
//!
//! A ticket is a token whose `authorization.permissions` carries one
//! `{ rsid: <workspace id>, rsname: "workspace", permissions: [...] }`
//! entry. It must verify through the same [`TokenValidator`] as access
//! tokens, so every issuer produces RSA-signed JWTs with a `kid` from the
//! validator's key set.
//!
//! [`TokenValidator`]: crate::validator::TokenValidator

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::claims::{IamClaims, UmaPermission};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Everything an issuer needs to mint one ticket.
#[derive(Clone)]
pub struct TicketRequest {
    /// Identity-provider subject
    pub subject: String,
    /// Login name
    pub username: String,
    /// Workspace the ticket is scoped to
    pub workspace_id: u64,
    /// Permission ids snapshotted into the ticket
    pub permissions: Vec<String>,
    /// Requested expiry
    pub expires_at: DateTime<Utc>,
    /// Caller's access token, for issuers that exchange it
    pub subject_token: Option<String>,
}

impl std::fmt::Debug for TicketRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketRequest")
            .field("subject", &self.subject)
            .field("workspace_id", &self.workspace_id)
            .field("permissions", &self.permissions.len())
            .field("expires_at", &self.expires_at)
            .field("subject_token", &self.subject_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TicketRequest {
    /// The permission entry the ticket must carry.
    pub fn permission_claim(&self) -> UmaPermission {
        UmaPermission::workspace(self.workspace_id, self.permissions.clone())
    }
}

/// A freshly minted ticket.
#[derive(Clone)]
pub struct IssuedTicket {
    /// Encoded ticket
    pub token: String,
    /// Expiry actually granted
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedTicket")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints workspace tickets.
#[async_trait]
pub trait TicketIssuer: Send + Sync {
    /// Mint a ticket for the request.
    async fn issue(&self, request: &TicketRequest) -> AuthResult<IssuedTicket>;
}

/// Signature algorithms a ticket may be signed with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    #[default]
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
}

impl From<TicketAlgorithm> for Algorithm {
    fn from(alg: TicketAlgorithm) -> Self {
        match alg {
            TicketAlgorithm::RS256 => Algorithm::RS256,
            TicketAlgorithm::RS384 => Algorithm::RS384,
            TicketAlgorithm::RS512 => Algorithm::RS512,
        }
    }
}

/// Signs tickets locally with an RSA private key.
///
/// The matching public key must be published in the key set the
/// validator loads, under the same `kid`.
pub struct SignedTicketIssuer {
    kid: String,
    algorithm: TicketAlgorithm,
    issuer: Option<String>,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for SignedTicketIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTicketIssuer")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("encoding_key", &"[REDACTED]")
            .finish()
    }
}

impl SignedTicketIssuer {
    /// Create an RS256 issuer from a PEM private key (PKCS#1 or PKCS#8).
    pub fn from_rsa_pem(kid: impl Into<String>, private_key_pem: &[u8]) -> AuthResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| AuthError::Configuration(format!("Invalid RSA private key: {e}")))?;

        Ok(Self {
            kid: kid.into(),
            algorithm: TicketAlgorithm::default(),
            issuer: None,
            encoding_key,
        })
    }

    /// Sign with another RSA algorithm.
    pub fn with_algorithm(mut self, algorithm: TicketAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Stamp `iss` on every ticket.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Key id written into ticket headers.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    fn claims(&self, request: &TicketRequest) -> IamClaims {
        let mut claims = IamClaims::new(&request.subject, &request.username, chrono::Duration::zero())
            .with_uma_permission(request.permission_claim());
        claims.exp = request.expires_at.timestamp();
        if let Some(ref issuer) = self.issuer {
            claims = claims.with_issuer(issuer);
        }
        claims
    }
}

#[async_trait]
impl TicketIssuer for SignedTicketIssuer {
    async fn issue(&self, request: &TicketRequest) -> AuthResult<IssuedTicket> {
        let mut header = Header::new(self.algorithm.into());
        header.kid = Some(self.kid.clone());

        let token = encode(&header, &self.claims(request), &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Ticket encoding failed: {e}")))?;

        Ok(IssuedTicket {
            token,
            expires_at: request.expires_at,
        })
    }
}

/// Grant type of the UMA requesting-party-token exchange.
pub const UMA_TICKET_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Format of the pushed `claim_token`.
pub const JWT_CLAIM_TOKEN_FORMAT: &str = "urn:ietf:params:oauth:token-type:jwt";

/// Obtains tickets as UMA requesting party tokens from Keycloak.
///
/// The permission entry is pushed as `claim_token`; the realm's
/// authorization policies decide what ends up in the RPT. Requires the
/// caller's access token on the request.
#[derive(Debug, Clone)]
pub struct KeycloakTicketIssuer {
    client: Client,
    token_url: String,
    audience: String,
}

#[derive(Debug, Deserialize)]
struct RptResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl KeycloakTicketIssuer {
    /// Create an issuer for the configured realm and client.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| AuthError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_url: config.token_url(),
            audience: config.client_id.clone(),
        })
    }

    fn claim_token(request: &TicketRequest) -> AuthResult<String> {
        let json = serde_json::to_vec(&request.permission_claim())
            .map_err(|e| AuthError::Internal(format!("claim token encoding failed: {e}")))?;
        Ok(STANDARD.encode(json))
    }
}

#[async_trait]
impl TicketIssuer for KeycloakTicketIssuer {
    #[instrument(skip(self, request), fields(workspace_id = request.workspace_id))]
    async fn issue(&self, request: &TicketRequest) -> AuthResult<IssuedTicket> {
        let subject_token = request.subject_token.as_deref().ok_or_else(|| {
            AuthError::Unauthenticated("an access token is required to request a ticket".to_string())
        })?;
        let claim_token = Self::claim_token(request)?;

        let form = [
            ("grant_type", UMA_TICKET_GRANT_TYPE),
            ("audience", self.audience.as_str()),
            ("claim_token", claim_token.as_str()),
            ("claim_token_format", JWT_CLAIM_TOKEN_FORMAT),
        ];

        debug!(url = %self.token_url, "Requesting UMA ticket");
        let response = self
            .client
            .post(&self.token_url)
            .bearer_auth(subject_token)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::external("keycloak", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = status.as_u16(), "UMA ticket request rejected");
            return Err(AuthError::external("keycloak", format!("{}: {message}", status.as_u16())));
        }

        let rpt: RptResponse = response
            .json()
            .await
            .map_err(|e| AuthError::external("keycloak", format!("invalid token response: {e}")))?;

        let expires_at = rpt
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            .map_or(request.expires_at, |granted| granted.min(request.expires_at));

        Ok(IssuedTicket {
            token: rpt.access_token,
            expires_at,
        })
    }
}
