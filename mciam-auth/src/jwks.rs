//! JSON Web Key Set types
//!
//! Serde model of the RFC 7517 document served at the identity provider's
//! `certs` endpoint, and conversion of its RSA entries into verification
//! keys.

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Signature algorithms accepted for identity-provider tokens.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// One JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, ...)
    pub kty: String,

    /// Key id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended use (`sig` or `enc`)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm the key is meant for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// X.509 certificate chain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,
}

impl Jwk {
    /// Build an RSA signing key entry.
    pub fn rsa(kid: impl Into<String>, alg: Algorithm, n: impl Into<String>, e: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: Some(kid.into()),
            key_use: Some("sig".to_string()),
            alg: Some(format!("{alg:?}")),
            n: Some(n.into()),
            e: Some(e.into()),
            x5c: Vec::new(),
        }
    }

    /// Whether the key may verify signatures.
    ///
    /// A missing `use` is treated as signing.
    pub fn is_signing_key(&self) -> bool {
        self.key_use.as_deref().map_or(true, |u| u == "sig")
    }

    /// Declared algorithm, if it is one we accept.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.alg
            .as_deref()
            .and_then(|alg| alg.parse::<Algorithm>().ok())
            .filter(|alg| ACCEPTED_ALGORITHMS.contains(alg))
    }

    fn decoding_key(&self) -> AuthResult<DecodingKey> {
        if self.kty != "RSA" {
            return Err(AuthError::KeySetFetch(format!("unsupported key type {}", self.kty)));
        }
        let (n, e) = self
            .n
            .as_deref()
            .zip(self.e.as_deref())
            .ok_or_else(|| AuthError::KeySetFetch("RSA key without modulus or exponent".to_string()))?;

        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| AuthError::KeySetFetch(format!("invalid RSA components: {err}")))
    }
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by `kid`.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// Verification key built from a [`Jwk`].
#[derive(Clone)]
pub(crate) struct VerificationKey {
    pub(crate) key: DecodingKey,
    /// Algorithm pinned by the JWK, if any
    pub(crate) algorithm: Option<Algorithm>,
}

/// Convert the usable entries of a key set, keyed by `kid`.
///
/// Encryption keys, non-RSA keys and keys without `kid` are skipped with a
/// warning. A set with no usable key is an error.
pub(crate) fn verification_keys(set: &JwkSet) -> AuthResult<HashMap<String, VerificationKey>> {
    let mut keys = HashMap::new();

    for jwk in &set.keys {
        let Some(kid) = jwk.kid.as_deref() else {
            warn!(kty = %jwk.kty, "Skipping JWK without kid");
            continue;
        };
        if !jwk.is_signing_key() {
            continue;
        }

        match jwk.decoding_key() {
            Ok(key) => {
                keys.insert(
                    kid.to_string(),
                    VerificationKey {
                        key,
                        algorithm: jwk.algorithm(),
                    },
                );
            }
            Err(err) => warn!(kid, error = %err, "Skipping unusable JWK"),
        }
    }

    if keys.is_empty() {
        return Err(AuthError::KeySetFetch("key set has no usable RSA signing key".to_string()));
    }
    Ok(keys)
}
