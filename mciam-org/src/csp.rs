//! Cloud service provider roles and their bindings to internal roles
//!
//! A [`CspRole`] names a role in an external cloud (an ARN or equivalent).
//! A [`RoleMasterCspRoleMapping`] binds an internal role to one of those for
//! a given federation method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix applied to cloud role names created on behalf of the platform.
pub const CSP_ROLE_NAME_PREFIX: &str = "mciam-";

/// Supported cloud service providers.
///
/// # Examples
///
/// ```
/// use mciam_org::CspType;
///
/// assert_eq!(CspType::parse("AWS"), Some(CspType::Aws));
/// assert_eq!(CspType::Alibaba.as_str(), "alibaba");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CspType {
    /// Amazon Web Services
    Aws,
    /// Google Cloud Platform
    Gcp,
    /// Microsoft Azure
    Azure,
    /// Alibaba Cloud
    Alibaba,
}

impl CspType {
    /// Parse a provider name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Some(Self::Aws),
            "gcp" => Some(Self::Gcp),
            "azure" => Some(Self::Azure),
            "alibaba" => Some(Self::Alibaba),
            _ => None,
        }
    }

    /// Lowercase wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
            Self::Alibaba => "alibaba",
        }
    }
}

impl fmt::Display for CspType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Federation protocol used to assume a cloud role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthMethod {
    /// OpenID Connect web identity
    Oidc,
    /// SAML assertion
    Saml,
}

impl AuthMethod {
    /// Uppercase wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oidc => "OIDC",
            Self::Saml => "SAML",
        }
    }

    /// Parse a method name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OIDC" => Some(Self::Oidc),
            "SAML" => Some(Self::Saml),
            _ => None,
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target role in an external cloud.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CspRole {
    /// Role id
    pub id: u64,

    /// Role name in the cloud
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Cloud the role lives in
    pub csp_type: CspType,

    /// Provider-specific role identifier, e.g. an AWS role ARN
    pub role_arn: String,

    /// Identity-provider connection trusted by the role, e.g. an OIDC
    /// provider ARN
    #[serde(default)]
    pub idp_identifier: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl CspRole {
    /// Create a CSP role.
    pub fn new(
        id: u64,
        name: impl Into<String>,
        csp_type: CspType,
        role_arn: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            csp_type,
            role_arn: role_arn.into(),
            idp_identifier: None,
            created_at: Utc::now(),
        }
    }

    /// Set the trusted identity-provider connection.
    pub fn with_idp_identifier(mut self, idp_identifier: impl Into<String>) -> Self {
        self.idp_identifier = Some(idp_identifier.into());
        self
    }

    /// Whether the role name carries the platform prefix.
    pub fn is_platform_managed(&self) -> bool {
        self.name.starts_with(CSP_ROLE_NAME_PREFIX)
    }
}

/// Binding of an internal role to a CSP role for one federation method.
///
/// Unique per `(role_id, auth_method, csp_type)`; see
/// [`RoleMasterCspRoleMapping::key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleMasterCspRoleMapping {
    /// Internal role
    pub role_id: u64,

    /// Federation method
    pub auth_method: AuthMethod,

    /// Cloud of the bound role
    pub csp_type: CspType,

    /// Bound CSP role
    pub csp_role_id: u64,

    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl RoleMasterCspRoleMapping {
    /// Create a mapping.
    pub fn new(role_id: u64, auth_method: AuthMethod, csp_type: CspType, csp_role_id: u64) -> Self {
        Self {
            role_id,
            auth_method,
            csp_type,
            csp_role_id,
            description: String::new(),
        }
    }

    /// Uniqueness key of the mapping.
    pub fn key(&self) -> (u64, AuthMethod, CspType) {
        (self.role_id, self.auth_method, self.csp_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_type_parse() {
        assert_eq!(CspType::parse(" gcp "), Some(CspType::Gcp));
        assert_eq!(CspType::parse("Azure"), Some(CspType::Azure));
        assert_eq!(CspType::parse("nhn"), None);
    }

    #[test]
    fn test_auth_method_serde() {
        let json = serde_json::to_string(&AuthMethod::Oidc).unwrap();
        assert_eq!(json, "\"OIDC\"");

        let method: AuthMethod = serde_json::from_str("\"SAML\"").unwrap();
        assert_eq!(method, AuthMethod::Saml);
        assert_eq!(AuthMethod::parse("oidc"), Some(AuthMethod::Oidc));
    }

    #[test]
    fn test_csp_role_prefix() {
        let managed = CspRole::new(1, "mciam-operator", CspType::Aws, "arn:aws:iam::1:role/mciam-operator");
        let foreign = CspRole::new(2, "legacy", CspType::Aws, "arn:aws:iam::1:role/legacy");

        assert!(managed.is_platform_managed());
        assert!(!foreign.is_platform_managed());
    }

    #[test]
    fn test_mapping_key() {
        let mapping = RoleMasterCspRoleMapping::new(3, AuthMethod::Oidc, CspType::Alibaba, 8);
        assert_eq!(mapping.key(), (3, AuthMethod::Oidc, CspType::Alibaba));
    }
}
