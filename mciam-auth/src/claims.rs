//! Identity-provider token claims
//!
//! This module defines the claim set carried by Keycloak access tokens and
//! by workspace tickets: realm roles, per-client roles and the UMA
//! `authorization.permissions` array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Realm roles every Keycloak user receives; never platform roles.
pub const DEFAULT_REALM_ROLES: [&str; 2] = ["offline_access", "uma_authorization"];

/// Resource name carried by workspace ticket permission entries.
pub const WORKSPACE_RESOURCE: &str = "workspace";

/// Claims of a validated access token or workspace ticket.
///
/// Only `sub` and `exp` are required. Everything else defaults so that
/// tokens from differently configured clients still decode.
///
/// # Example
///
/// ```rust
/// use mciam_auth::claims::IamClaims;
///
/// let claims = IamClaims::new("kc-subject", "alice", chrono::Duration::minutes(5))
///     .with_realm_roles(["admin"]);
///
/// assert!(claims.has_realm_role("admin"));
/// assert_eq!(claims.username(), "alice");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamClaims {
    // Standard JWT claims (RFC 7519)
    /// Subject (identity-provider user id)
    pub sub: String,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    /// Not before (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// JWT ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    // Keycloak claims
    /// Login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Authorized party (client the token was issued to)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Realm-scoped roles
    #[serde(default)]
    pub realm_access: RoleClaim,

    /// Client-scoped roles, keyed by client id
    #[serde(default)]
    pub resource_access: HashMap<String, RoleClaim>,

    /// UMA authorization block (present on requesting party tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationClaim>,

    /// Everything else
    #[serde(default, flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

/// `aud` is either one string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    One(String),
    /// Multiple audiences
    Many(Vec<String>),
}

impl Audience {
    /// Check whether the audience includes `value`.
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::One(aud) => aud == value,
            Audience::Many(auds) => auds.iter().any(|a| a == value),
        }
    }
}

/// `{ "roles": [...] }` as used by `realm_access` and `resource_access`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// UMA `authorization` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationClaim {
    #[serde(default)]
    pub permissions: Vec<UmaPermission>,
}

/// One entry of `authorization.permissions`.
///
/// Workspace tickets use `rsid` for the workspace id, `rsname` fixed to
/// `"workspace"` and carry the resolved permission ids in `permissions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmaPermission {
    /// Resource id
    #[serde(default)]
    pub rsid: String,

    /// Resource name
    #[serde(default)]
    pub rsname: String,

    /// Granted scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Permission ids snapshotted into the ticket
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl UmaPermission {
    /// Build the permission entry of a workspace ticket.
    pub fn workspace(workspace_id: u64, permissions: Vec<String>) -> Self {
        Self {
            rsid: workspace_id.to_string(),
            rsname: WORKSPACE_RESOURCE.to_string(),
            scopes: Vec::new(),
            permissions,
        }
    }
}

impl IamClaims {
    /// Create claims for a subject valid for `duration` from now.
    pub fn new(subject: impl Into<String>, username: impl Into<String>, duration: chrono::Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.into(),
            iss: None,
            aud: None,
            exp: (now + duration).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            jti: Some(Uuid::now_v7().to_string()),
            preferred_username: Some(username.into()),
            email: None,
            azp: None,
            realm_access: RoleClaim::default(),
            resource_access: HashMap::new(),
            authorization: None,
            custom: HashMap::new(),
        }
    }

    /// Login name, falling back to the subject.
    pub fn username(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or(&self.sub)
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Get expiration as DateTime.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Realm roles as issued.
    pub fn realm_roles(&self) -> &[String] {
        &self.realm_access.roles
    }

    /// Realm roles minus the ones Keycloak assigns to everybody.
    ///
    /// `default-roles-<realm>` is dropped for any realm.
    pub fn platform_roles(&self) -> Vec<&str> {
        self.realm_access
            .roles
            .iter()
            .map(String::as_str)
            .filter(|role| !DEFAULT_REALM_ROLES.contains(role) && !role.starts_with("default-roles-"))
            .collect()
    }

    /// Check for a realm role.
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access.roles.iter().any(|r| r == role)
    }

    /// Roles granted by one client.
    pub fn client_roles(&self, client_id: &str) -> &[String] {
        self.resource_access
            .get(client_id)
            .map(|c| c.roles.as_slice())
            .unwrap_or_default()
    }

    /// UMA permission entries, empty when the block is absent.
    pub fn uma_permissions(&self) -> &[UmaPermission] {
        self.authorization
            .as_ref()
            .map(|a| a.permissions.as_slice())
            .unwrap_or_default()
    }

    /// The first entry whose resource name is `"workspace"`.
    pub fn workspace_permission(&self) -> Option<&UmaPermission> {
        self.uma_permissions()
            .iter()
            .find(|p| p.rsname == WORKSPACE_RESOURCE)
    }

    /// Check a UMA permission given as `resource` or `resource#scope`.
    ///
    /// The resource part is matched against `rsname`.
    pub fn has_uma_permission(&self, permission: &str) -> bool {
        let (resource, scope) = match permission.split_once('#') {
            Some((resource, scope)) => (resource, Some(scope)),
            None => (permission, None),
        };

        self.uma_permissions().iter().any(|p| {
            p.rsname == resource && scope.map_or(true, |s| p.scopes.iter().any(|x| x == s))
        })
    }

    /// Set the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = Some(issuer.into());
        self
    }

    /// Set the audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.aud = Some(Audience::One(audience.into()));
        self
    }

    /// Set the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Add realm roles.
    pub fn with_realm_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.realm_access.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add roles granted by a client.
    pub fn with_client_roles<I, S>(mut self, client_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_access
            .entry(client_id.into())
            .or_default()
            .roles
            .extend(roles.into_iter().map(Into::into));
        self
    }

    /// Append a UMA permission entry.
    pub fn with_uma_permission(mut self, permission: UmaPermission) -> Self {
        self.authorization
            .get_or_insert_with(AuthorizationClaim::default)
            .permissions
            .push(permission);
        self
    }
}
