//! Role assignment records
//!
//! This module provides the records that grant roles to users, either
//! platform-wide or inside one workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform-scope grant of a role to a user.
///
/// # Examples
///
/// ```
/// use mciam_org::UserPlatformRole;
///
/// let grant = UserPlatformRole::new(42, 1);
/// assert_eq!(grant.role_id, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPlatformRole {
    /// Local user id
    pub user_id: u64,

    /// Granted role
    pub role_id: u64,

    /// When the grant was made
    pub created_at: DateTime<Utc>,
}

impl UserPlatformRole {
    /// Creates a new platform-role grant.
    pub fn new(user_id: u64, role_id: u64) -> Self {
        Self {
            user_id,
            role_id,
            created_at: Utc::now(),
        }
    }
}

/// Workspace-scope grant of a role to a user.
///
/// The name columns are a read-side convenience copied at assignment time;
/// the ids are authoritative.
///
/// # Examples
///
/// ```
/// use mciam_org::UserWorkspaceRole;
///
/// let grant = UserWorkspaceRole::new(42, 3, 10)
///     .with_names("alice", "analytics", "operator");
///
/// assert_eq!(grant.workspace_id, 3);
/// assert_eq!(grant.role_name.as_deref(), Some("operator"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserWorkspaceRole {
    /// Local user id
    pub user_id: u64,

    /// Workspace the grant applies to
    pub workspace_id: u64,

    /// Granted role
    pub role_id: u64,

    /// Denormalized user name
    #[serde(default)]
    pub username: Option<String>,

    /// Denormalized workspace name
    #[serde(default)]
    pub workspace_name: Option<String>,

    /// Denormalized role name
    #[serde(default)]
    pub role_name: Option<String>,

    /// When the grant was made
    pub created_at: DateTime<Utc>,
}

impl UserWorkspaceRole {
    /// Creates a new workspace-role grant.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The local user id
    /// * `workspace_id` - The workspace the grant is scoped to
    /// * `role_id` - The granted role
    pub fn new(user_id: u64, workspace_id: u64, role_id: u64) -> Self {
        Self {
            user_id,
            workspace_id,
            role_id,
            username: None,
            workspace_name: None,
            role_name: None,
            created_at: Utc::now(),
        }
    }

    /// Fill the denormalized name columns.
    pub fn with_names(
        mut self,
        username: impl Into<String>,
        workspace_name: impl Into<String>,
        role_name: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.workspace_name = Some(workspace_name.into());
        self.role_name = Some(role_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_role_grant() {
        let grant = UserPlatformRole::new(1, 2);
        assert_eq!(grant.user_id, 1);
        assert_eq!(grant.role_id, 2);
    }

    #[test]
    fn test_workspace_role_grant_without_names() {
        let grant = UserWorkspaceRole::new(1, 5, 9);

        assert_eq!(grant.workspace_id, 5);
        assert!(grant.username.is_none());
        assert!(grant.workspace_name.is_none());
    }

    #[test]
    fn test_workspace_role_deserializes_without_names() {
        let json = r#"{
            "user_id": 1,
            "workspace_id": 5,
            "role_id": 9,
            "created_at": "2025-01-01T00:00:00Z"
        }"#;

        let grant: UserWorkspaceRole = serde_json::from_str(json).unwrap();
        assert_eq!(grant.role_id, 9);
        assert!(grant.role_name.is_none());
    }
}
