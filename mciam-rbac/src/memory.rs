//! In-memory role and permission store
//!
//! Backs tests and embedded deployments that load their grants at startup.
//! Implements both [`RoleRepository`] and [`PermissionRepository`].

use async_trait::async_trait;
use mciam_org::{
    AuthMethod, CspRole, CspType, RoleMaster, RoleMasterCspRoleMapping, RoleType, User,
    UserPlatformRole, UserWorkspaceRole,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::actions::ApiPermissionActionMapping;
use crate::error::{RepositoryError, RepositoryResult};
use crate::permissions::RolePermission;
use crate::repository::{PermissionRepository, RoleRepository};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    roles: HashMap<u64, RoleMaster>,
    platform_roles: Vec<UserPlatformRole>,
    workspace_roles: Vec<UserWorkspaceRole>,
    role_permissions: Vec<RolePermission>,
    action_mappings: Vec<ApiPermissionActionMapping>,
    csp_roles: HashMap<u64, CspRole>,
    csp_mappings: Vec<RoleMasterCspRoleMapping>,
}

/// In-memory implementation of the role and permission repositories.
///
/// Clones share the same tables.
///
/// # Example
///
/// ```rust,no_run
/// use mciam_org::{RoleMaster, RoleType, User};
/// use mciam_rbac::InMemoryDirectory;
///
/// # async fn example() {
/// let directory = InMemoryDirectory::new();
/// directory.insert_user(User::new(1, "kc-1", "alice")).await;
/// directory.insert_role(RoleMaster::new(10, "viewer", RoleType::Platform)).await;
/// directory.grant_platform_role(1, 10).await;
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
}

impl std::fmt::Debug for InMemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDirectory")
            .field("offline", &self.offline.load(Ordering::Relaxed))
            .finish()
    }
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail with [`RepositoryError::Unavailable`] until
    /// switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> RepositoryResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("directory is offline".to_string()));
        }
        Ok(())
    }

    /// Insert or replace a user, keyed by subject.
    pub async fn insert_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.kc_user_id.clone(), user);
    }

    /// Insert or replace a role.
    pub async fn insert_role(&self, role: RoleMaster) {
        let mut tables = self.tables.write().await;
        tables.roles.insert(role.id, role);
    }

    /// Grant a role platform-wide.
    pub async fn grant_platform_role(&self, user_id: u64, role_id: u64) {
        let mut tables = self.tables.write().await;
        let exists = tables
            .platform_roles
            .iter()
            .any(|g| g.user_id == user_id && g.role_id == role_id);
        if !exists {
            tables.platform_roles.push(UserPlatformRole::new(user_id, role_id));
        }
    }

    /// Grant a role inside a workspace.
    pub async fn grant_workspace_role(&self, user_id: u64, workspace_id: u64, role_id: u64) {
        let mut tables = self.tables.write().await;
        let exists = tables.workspace_roles.iter().any(|g| {
            g.user_id == user_id && g.workspace_id == workspace_id && g.role_id == role_id
        });
        if !exists {
            tables
                .workspace_roles
                .push(UserWorkspaceRole::new(user_id, workspace_id, role_id));
        }
    }

    /// Grant a permission to a role.
    pub async fn grant_permission(&self, grant: RolePermission) {
        let mut tables = self.tables.write().await;
        if !tables.role_permissions.contains(&grant) {
            tables.role_permissions.push(grant);
        }
    }

    /// Map a permission to an action.
    pub async fn map_action(&self, mapping: ApiPermissionActionMapping) {
        let mut tables = self.tables.write().await;
        if !tables.action_mappings.contains(&mapping) {
            tables.action_mappings.push(mapping);
        }
    }

    /// Insert or replace a CSP role.
    pub async fn insert_csp_role(&self, role: CspRole) {
        let mut tables = self.tables.write().await;
        tables.csp_roles.insert(role.id, role);
    }

    /// Bind a role to a CSP role.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Conflict`] if a mapping with the same
    /// `(role, auth_method, csp_type)` already exists.
    pub async fn insert_csp_mapping(&self, mapping: RoleMasterCspRoleMapping) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.csp_mappings.iter().any(|m| m.key() == mapping.key()) {
            return Err(RepositoryError::Conflict(format!(
                "CSP mapping already exists for role {} ({}, {})",
                mapping.role_id, mapping.auth_method, mapping.csp_type
            )));
        }
        tables.csp_mappings.push(mapping);
        Ok(())
    }

    fn roles_by_id(tables: &Tables, ids: impl Iterator<Item = u64>) -> Vec<RoleMaster> {
        let mut roles: Vec<RoleMaster> = ids.filter_map(|id| tables.roles.get(&id).cloned()).collect();
        roles.sort_by_key(|r| r.id);
        roles.dedup_by_key(|r| r.id);
        roles
    }
}

#[async_trait]
impl RoleRepository for InMemoryDirectory {
    async fn find_user_by_kc_id(&self, kc_user_id: &str) -> RepositoryResult<Option<User>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.users.get(kc_user_id).cloned())
    }

    async fn user_platform_roles(&self, user_id: u64) -> RepositoryResult<Vec<RoleMaster>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let ids = tables
            .platform_roles
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.role_id);
        Ok(Self::roles_by_id(&tables, ids))
    }

    async fn user_workspace_roles(
        &self,
        user_id: u64,
        workspace_id: u64,
    ) -> RepositoryResult<Vec<RoleMaster>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let ids = tables
            .workspace_roles
            .iter()
            .filter(|g| g.user_id == user_id && g.workspace_id == workspace_id)
            .map(|g| g.role_id);
        Ok(Self::roles_by_id(&tables, ids))
    }

    async fn csp_role_mappings(
        &self,
        role_id: u64,
        auth_method: AuthMethod,
        csp_type: CspType,
    ) -> RepositoryResult<Vec<RoleMasterCspRoleMapping>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .csp_mappings
            .iter()
            .filter(|m| m.key() == (role_id, auth_method, csp_type))
            .cloned()
            .collect())
    }

    async fn find_csp_role(&self, csp_role_id: u64) -> RepositoryResult<Option<CspRole>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.csp_roles.get(&csp_role_id).cloned())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryDirectory {
    async fn role_permissions(
        &self,
        role_type: RoleType,
        role_id: u64,
    ) -> RepositoryResult<Vec<String>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .role_permissions
            .iter()
            .filter(|g| g.role_type == role_type && g.role_id == role_id)
            .map(|g| g.permission_id.clone())
            .collect())
    }

    async fn permission_actions(
        &self,
        permission_id: &str,
    ) -> RepositoryResult<Vec<ApiPermissionActionMapping>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .action_mappings
            .iter()
            .filter(|m| m.permission_id == permission_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_role_permissions_are_namespaced_by_type() {
        let dir = InMemoryDirectory::new();
        dir.grant_permission(RolePermission::new(RoleType::Platform, 1, "a:a:a")).await;
        dir.grant_permission(RolePermission::new(RoleType::Workspace, 1, "b:b:b")).await;

        let platform = dir.role_permissions(RoleType::Platform, 1).await.unwrap();
        let workspace = dir.role_permissions(RoleType::Workspace, 1).await.unwrap();

        assert_eq!(platform, vec!["a:a:a".to_string()]);
        assert_eq!(workspace, vec!["b:b:b".to_string()]);
    }

    #[tokio::test]
    async fn test_workspace_roles_are_scoped() {
        let dir = InMemoryDirectory::new();
        dir.insert_role(RoleMaster::new(5, "operator", RoleType::Workspace)).await;
        dir.grant_workspace_role(1, 100, 5).await;
        dir.grant_workspace_role(1, 100, 5).await;

        assert_eq!(dir.user_workspace_roles(1, 100).await.unwrap().len(), 1);
        assert!(dir.user_workspace_roles(1, 200).await.unwrap().is_empty());
        assert!(dir.user_workspace_roles(2, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_csp_mapping_uniqueness() {
        let dir = InMemoryDirectory::new();
        let mapping = RoleMasterCspRoleMapping::new(5, AuthMethod::Oidc, CspType::Aws, 1);

        assert!(dir.insert_csp_mapping(mapping.clone()).await.is_ok());
        assert!(matches!(
            dir.insert_csp_mapping(mapping).await,
            Err(RepositoryError::Conflict(_))
        ));

        // Same role, other method is a different key
        let saml = RoleMasterCspRoleMapping::new(5, AuthMethod::Saml, CspType::Aws, 2);
        assert!(dir.insert_csp_mapping(saml).await.is_ok());
    }

    #[tokio::test]
    async fn test_offline_reads_fail() {
        let dir = InMemoryDirectory::new();
        dir.set_offline(true);

        assert!(matches!(
            dir.find_user_by_kc_id("kc").await,
            Err(RepositoryError::Unavailable(_))
        ));

        dir.set_offline(false);
        assert!(dir.find_user_by_kc_id("kc").await.unwrap().is_none());
    }
}
