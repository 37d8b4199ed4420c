//! # Permissions
//!
//! Permission identifiers, role grants and permission sets.
//! A permission id combines a framework, a resource type and an action.

use mciam_org::RoleType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix shared by every menu-view permission (`menu:menu:view:<menu id>`).
pub const MENU_VIEW_PERMISSION_PREFIX: &str = "menu:menu:view:";

/// Permission that alone is enough for basic workspace access.
pub const WORKSPACE_READ_PERMISSION: &str = "mc-iam-manager:workspace:read";

/// Check whether a permission id opens basic (level 2) access.
///
/// # Example
///
/// ```
/// use mciam_rbac::permissions::grants_basic_access;
///
/// assert!(grants_basic_access("menu:menu:view:dashboard"));
/// assert!(grants_basic_access("mc-iam-manager:workspace:read"));
/// assert!(!grants_basic_access("mc-iam-manager:workspace:update"));
/// ```
pub fn grants_basic_access(permission_id: &str) -> bool {
    permission_id.starts_with(MENU_VIEW_PERMISSION_PREFIX) || permission_id == WORKSPACE_READ_PERMISSION
}

/// A permission definition.
///
/// Ids have the shape `framework:resource_type:action`, optionally followed
/// by `:resource_id` for instance-scoped permissions such as menu views.
///
/// # Example
///
/// ```
/// use mciam_rbac::permissions::Permission;
///
/// let perm = Permission::new("mc-iam-manager", "workspace", "read");
/// assert_eq!(perm.id(), "mc-iam-manager:workspace:read");
///
/// let menu = Permission::for_resource("menu", "menu", "view", "dashboard");
/// assert_eq!(menu.id(), "menu:menu:view:dashboard");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    /// Owning framework (e.g. `mc-iam-manager`, `mc-infra-manager`).
    pub framework_id: String,
    /// Resource type within the framework.
    pub resource_type_id: String,
    /// Action on the resource type.
    pub action: String,
    /// Optional: specific resource instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

impl Permission {
    /// Create a permission covering every resource of a type.
    pub fn new(
        framework_id: impl Into<String>,
        resource_type_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            framework_id: framework_id.into(),
            resource_type_id: resource_type_id.into(),
            action: action.into(),
            resource_id: None,
            name: String::new(),
            description: String::new(),
        }
    }

    /// Create a permission for a specific resource instance.
    ///
    /// # Arguments
    ///
    /// * `framework_id` - The owning framework
    /// * `resource_type_id` - The resource type
    /// * `action` - The action allowed
    /// * `resource_id` - The specific resource
    pub fn for_resource(
        framework_id: impl Into<String>,
        resource_type_id: impl Into<String>,
        action: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            ..Self::new(framework_id, resource_type_id, action)
        }
    }

    /// Permission id granting view access to one menu.
    pub fn menu_view(menu_id: impl Into<String>) -> Self {
        Self::for_resource("menu", "menu", "view", menu_id)
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The permission id (e.g. `mc-iam-manager:workspace:read`).
    pub fn id(&self) -> String {
        match self.resource_id {
            Some(ref id) => format!(
                "{}:{}:{}:{}",
                self.framework_id, self.resource_type_id, self.action, id
            ),
            None => format!("{}:{}:{}", self.framework_id, self.resource_type_id, self.action),
        }
    }

    /// Parse a permission id.
    ///
    /// # Returns
    ///
    /// `Some(Permission)` if the id has at least three non-empty segments,
    /// `None` otherwise. Extra segments form the resource id.
    ///
    /// # Example
    ///
    /// ```
    /// use mciam_rbac::permissions::Permission;
    ///
    /// let perm = Permission::parse("mc-infra-manager:vm:create").unwrap();
    /// assert_eq!(perm.resource_type_id, "vm");
    /// assert!(perm.resource_id.is_none());
    ///
    /// assert!(Permission::parse("menu:view").is_none());
    /// ```
    pub fn parse(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split(':').collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return None;
        }

        let perm = Self::new(parts[0], parts[1], parts[2]);
        if parts.len() > 3 {
            Some(Self {
                resource_id: Some(parts[3..].join(":")),
                ..perm
            })
        } else {
            Some(perm)
        }
    }

    /// Whether this permission opens basic access.
    pub fn grants_basic_access(&self) -> bool {
        grants_basic_access(&self.id())
    }
}

/// Grant of a permission to a role.
///
/// Role ids are only unique within a role type, so the type is part of the
/// grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RolePermission {
    /// Namespace of `role_id`
    pub role_type: RoleType,
    /// Granted role
    pub role_id: u64,
    /// Granted permission id
    pub permission_id: String,
}

impl RolePermission {
    /// Create a grant.
    pub fn new(role_type: RoleType, role_id: u64, permission_id: impl Into<String>) -> Self {
        Self {
            role_type,
            role_id,
            permission_id: permission_id.into(),
        }
    }
}

/// A set of permission ids.
///
/// Grants only add up; there is no deny entry. Iteration order is sorted,
/// which keeps ticket snapshots stable.
///
/// # Example
///
/// ```
/// use mciam_rbac::permissions::PermissionSet;
///
/// let mut set = PermissionSet::new();
/// set.add("menu:menu:view:dashboard");
/// set.add("mc-infra-manager:vm:create");
///
/// assert!(set.has("mc-infra-manager:vm:create"));
/// assert!(set.grants_basic_access());
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<String>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a permission id to the set.
    ///
    /// # Returns
    ///
    /// `true` if the id was not present yet
    pub fn add(&mut self, permission_id: impl Into<String>) -> bool {
        self.permissions.insert(permission_id.into())
    }

    /// Add multiple permission ids to the set.
    pub fn add_all<I, S>(&mut self, permission_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in permission_ids {
            self.add(id);
        }
    }

    /// Remove a permission id from the set.
    pub fn remove(&mut self, permission_id: &str) -> bool {
        self.permissions.remove(permission_id)
    }

    /// Check if the set contains a permission id.
    pub fn has(&self, permission_id: &str) -> bool {
        self.permissions.contains(permission_id)
    }

    /// Check if any permission in the set opens basic access.
    pub fn grants_basic_access(&self) -> bool {
        self.permissions.iter().any(|id| grants_basic_access(id))
    }

    /// Merge another permission set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        self.permissions.extend(other.permissions.iter().cloned());
    }

    /// Iterate over the permission ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    /// Permission ids as an owned, sorted vector.
    pub fn to_vec(&self) -> Vec<String> {
        self.permissions.iter().cloned().collect()
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = PermissionSet::new();
        set.add_all(iter);
        set
    }
}
