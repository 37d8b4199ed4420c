//! Role nodes and role-type tagging
//!
//! A [`RoleMaster`] is a named role; one or more [`RoleSub`] tags decide which
//! assignment tables the role may appear in. The same master can serve as a
//! platform role and a CSP role at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope a role can be granted in.
///
/// Role ids share one table, so the type also disambiguates the
/// `(role_type, role_id)` pairs used by permission grants.
///
/// # Examples
///
/// ```
/// use mciam_org::RoleType;
///
/// assert_eq!(RoleType::parse("WORKSPACE"), Some(RoleType::Workspace));
/// assert_eq!(RoleType::Csp.as_str(), "csp");
/// assert_eq!(RoleType::parse("tenant"), None);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Granted through `UserPlatformRole`
    Platform,

    /// Granted per workspace through `UserWorkspaceRole`
    Workspace,

    /// Bound to external cloud roles through CSP role mappings
    Csp,
}

impl RoleType {
    /// All role types, in declaration order.
    pub const ALL: [RoleType; 3] = [RoleType::Platform, RoleType::Workspace, RoleType::Csp];

    /// Parse a role type (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "platform" => Some(Self::Platform),
            "workspace" => Some(Self::Workspace),
            "csp" => Some(Self::Csp),
            _ => None,
        }
    }

    /// Lowercase wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Workspace => "workspace",
            Self::Csp => "csp",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag attached to a role master.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleSub {
    /// Tagged role
    pub role_id: u64,

    /// Scope the role is usable in
    pub role_type: RoleType,
}

/// A named role node.
///
/// The optional parent only groups roles into a tree; it never passes
/// permissions down to children.
///
/// # Examples
///
/// ```
/// use mciam_org::{RoleMaster, RoleType};
///
/// let mut role = RoleMaster::new(7, "operator", RoleType::Workspace);
/// role.add_type(RoleType::Csp);
///
/// assert!(role.has_type(RoleType::Workspace));
/// assert!(role.has_type(RoleType::Csp));
/// assert!(!role.has_type(RoleType::Platform));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct RoleMaster {
    /// Role id
    pub id: u64,

    /// Parent role used for grouping
    pub parent_id: Option<u64>,

    /// Unique role name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// System role that cannot be deleted
    pub predefined: bool,

    /// Type tags; never empty
    role_subs: Vec<RoleSub>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl RoleMaster {
    /// Create a role with its first type tag.
    ///
    /// A role always carries at least one type, so the first one is
    /// required up front.
    pub fn new(id: u64, name: impl Into<String>, role_type: RoleType) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            description: String::new(),
            predefined: false,
            role_subs: vec![RoleSub { role_id: id, role_type }],
            created_at: Utc::now(),
        }
    }

    /// Set the grouping parent.
    pub fn with_parent(mut self, parent_id: u64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark as a predefined system role.
    pub fn predefined(mut self) -> Self {
        self.predefined = true;
        self
    }

    /// Builder form of [`RoleMaster::add_type`].
    pub fn with_type(mut self, role_type: RoleType) -> Self {
        self.add_type(role_type);
        self
    }

    /// Tag the role with another type. Duplicates are ignored.
    pub fn add_type(&mut self, role_type: RoleType) {
        if !self.has_type(role_type) {
            self.role_subs.push(RoleSub {
                role_id: self.id,
                role_type,
            });
        }
    }

    /// Remove a type tag.
    ///
    /// # Returns
    ///
    /// `false` when the tag was absent or is the last remaining one
    pub fn remove_type(&mut self, role_type: RoleType) -> bool {
        if self.role_subs.len() <= 1 || !self.has_type(role_type) {
            return false;
        }
        self.role_subs.retain(|sub| sub.role_type != role_type);
        true
    }

    /// Check whether the role carries a type tag.
    pub fn has_type(&self, role_type: RoleType) -> bool {
        self.role_subs.iter().any(|sub| sub.role_type == role_type)
    }

    /// Type tags of this role.
    pub fn role_subs(&self) -> &[RoleSub] {
        &self.role_subs
    }

    /// Role types of this role.
    pub fn role_types(&self) -> impl Iterator<Item = RoleType> + '_ {
        self.role_subs.iter().map(|sub| sub.role_type)
    }

    /// Predefined roles are never deleted.
    pub fn can_delete(&self) -> bool {
        !self.predefined
    }
}
