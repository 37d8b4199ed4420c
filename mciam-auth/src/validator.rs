//! Bearer token validation against the identity provider's key set
//!
//! The key set is fetched once by [`TokenValidator::load_key_set`] and kept
//! in shared, read-mostly state. Validation never refetches; rotation is
//! handled by an explicit [`TokenValidator::refresh`].

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::claims::IamClaims;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwks::{verification_keys, JwkSet, VerificationKey, ACCEPTED_ALGORITHMS};

struct LoadedKeys {
    /// Where the set came from; `None` when installed directly
    source: Option<String>,
    keys: HashMap<String, VerificationKey>,
    loaded_at: DateTime<Utc>,
}

/// Verifies identity-provider tokens.
///
/// Cheap to clone; clones share the key set.
///
/// # Example
///
/// ```rust,no_run
/// use mciam_auth::{AuthConfig, TokenValidator};
///
/// # async fn example() -> mciam_auth::AuthResult<()> {
/// let config = AuthConfig::from_env();
/// let validator = TokenValidator::from_config(&config)?;
/// validator.load_key_set(&config.certs_url()).await?;
///
/// let claims = validator.validate("eyJhbGciOi...").await?;
/// println!("subject {}", claims.sub);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenValidator {
    client: Client,
    state: Arc<RwLock<Option<LoadedKeys>>>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: u64,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator with no key set loaded.
    pub fn new(http_timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            state: Arc::new(RwLock::new(None)),
            issuer: None,
            audience: None,
            leeway_secs: 0,
        })
    }

    /// Create a validator using the configured identity-provider timeout.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::new(config.http_timeout())
    }

    /// Require this `iss`.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require this `aud`. Off by default.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Clock skew tolerated on `exp` and `nbf`.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Fetch the key set from `certs_url` and make it current.
    ///
    /// Failing here means no token can be validated; callers treat it as a
    /// startup failure.
    #[instrument(skip(self))]
    pub async fn load_key_set(&self, certs_url: &str) -> AuthResult<()> {
        let set = self.fetch(certs_url).await.map_err(|err| {
            error!(error = %err, "Failed to load key set");
            err
        })?;
        self.swap(set, Some(certs_url.to_string())).await
    }

    /// Re-fetch the key set from the URL of the last load.
    ///
    /// On failure the previous set stays in place.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> AuthResult<()> {
        let source = {
            let state = self.state.read().await;
            state.as_ref().and_then(|s| s.source.clone())
        };
        let Some(url) = source else {
            return Err(AuthError::Configuration(
                "refresh requested before a key set was loaded from a URL".to_string(),
            ));
        };

        let set = self.fetch(&url).await.map_err(|err| {
            warn!(error = %err, "Key set refresh failed, keeping previous keys");
            err
        })?;
        self.swap(set, Some(url)).await
    }

    /// Install a key set obtained out of band.
    pub async fn install_key_set(&self, set: &JwkSet) -> AuthResult<()> {
        self.swap(set.clone(), None).await
    }

    /// Whether a key set is loaded.
    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Key ids of the loaded set, sorted.
    pub async fn key_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .as_ref()
            .map(|s| s.keys.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// When the current set was loaded.
    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.as_ref().map(|s| s.loaded_at)
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] if the token cannot be parsed
    /// - [`AuthError::InvalidToken`] for a non-RSA algorithm, a bad
    ///   signature, issuer, audience or not-before
    /// - [`AuthError::UnknownKey`] if the `kid` is not in the loaded set
    /// - [`AuthError::TokenExpired`] once `exp` has passed
    /// - [`AuthError::Configuration`] if no key set was ever loaded
    pub async fn validate(&self, token: &str) -> AuthResult<IamClaims> {
        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            debug!(alg = ?header.alg, "Rejected token algorithm");
            return Err(AuthError::InvalidToken(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::UnknownKey("token header has no kid".to_string()))?;

        let key = {
            let state = self.state.read().await;
            let loaded = state
                .as_ref()
                .ok_or_else(|| AuthError::Configuration("key set not loaded".to_string()))?;
            loaded
                .keys
                .get(&kid)
                .cloned()
                .ok_or_else(|| AuthError::UnknownKey(kid.clone()))?
        };

        if key.algorithm.is_some_and(|alg| alg != header.alg) {
            return Err(AuthError::InvalidToken(format!(
                "key {kid} is not for {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match self.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<IamClaims>(token, &key.key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidToken("Invalid signature".to_string()),
            ErrorKind::ImmatureSignature => AuthError::InvalidToken("Token not yet valid".to_string()),
            ErrorKind::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
            ErrorKind::InvalidAudience => AuthError::InvalidToken("Invalid audience".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::MalformedToken(e.to_string())
            }
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(data.claims)
    }

    async fn fetch(&self, url: &str) -> AuthResult<JwkSet> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::KeySetFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AuthError::KeySetFetch(format!("{}: {message}", status.as_u16())));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySetFetch(format!("invalid key set document: {e}")))
    }

    async fn swap(&self, set: JwkSet, source: Option<String>) -> AuthResult<()> {
        let keys = verification_keys(&set)?;
        let count = keys.len();

        let mut state = self.state.write().await;
        *state = Some(LoadedKeys {
            source,
            keys,
            loaded_at: Utc::now(),
        });
        info!(keys = count, "Key set loaded");
        Ok(())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header_value: &str) -> AuthResult<&str> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::Unauthenticated("expected a bearer token".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthenticated(format!("unsupported scheme {scheme}")));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthenticated("empty bearer token".to_string()));
    }
    Ok(token)
}
