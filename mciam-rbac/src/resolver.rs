//! Permission resolution
//!
//! Turns an identity-provider subject into the union of permissions and
//! actions granted by the user's platform roles and, when a workspace is
//! given, the user's roles in that workspace.

use mciam_org::{RoleMaster, RoleType, User};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{RbacError, RbacResult};
use crate::permissions::{grants_basic_access, PermissionSet};
use crate::repository::{PermissionRepository, RoleRepository};

/// Resolves role grants into permissions and actions.
///
/// Every grant is additive: a permission held through any role counts, and
/// there is no deny. A user with no qualifying role resolves to `false`,
/// never to an error.
#[derive(Clone)]
pub struct PermissionResolver {
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver").finish_non_exhaustive()
    }
}

impl PermissionResolver {
    /// Create a resolver over the given repositories.
    pub fn new(roles: Arc<dyn RoleRepository>, permissions: Arc<dyn PermissionRepository>) -> Self {
        Self { roles, permissions }
    }

    /// The role repository this resolver reads from.
    pub fn roles(&self) -> &Arc<dyn RoleRepository> {
        &self.roles
    }

    /// Look up the local user for a validated subject.
    ///
    /// # Errors
    ///
    /// [`RbacError::UserNotFound`] when the subject has no local record.
    pub async fn user(&self, kc_user_id: &str) -> RbacResult<User> {
        self.roles
            .find_user_by_kc_id(kc_user_id)
            .await?
            .ok_or_else(|| RbacError::UserNotFound(kc_user_id.to_string()))
    }

    /// Check whether the user may reach the console at all.
    ///
    /// Granted when any platform role of the user holds a menu-view
    /// permission or the workspace-read permission.
    #[instrument(skip(self))]
    pub async fn has_basic_access(&self, kc_user_id: &str) -> RbacResult<bool> {
        let user = self.user(kc_user_id).await?;
        if !user.enabled {
            debug!(user_id = user.id, "User disabled, denying basic access");
            return Ok(false);
        }

        for role in self.scoped_roles(&user, None).await? {
            let granted = self
                .permissions
                .role_permissions(RoleType::Platform, role.id)
                .await?;
            if let Some(permission) = granted.iter().find(|p| grants_basic_access(p)) {
                debug!(role = %role.name, permission = %permission, "Basic access granted");
                return Ok(true);
            }
        }

        debug!(user_id = user.id, "No basic-access permission found");
        Ok(false)
    }

    /// Check whether the user may perform a named action.
    ///
    /// # Arguments
    ///
    /// * `kc_user_id` - The identity-provider subject
    /// * `workspace_id` - Workspace of the request, if any
    /// * `action` - Action name to look for among mapped actions
    #[instrument(skip(self))]
    pub async fn has_permission(
        &self,
        kc_user_id: &str,
        workspace_id: Option<u64>,
        action: &str,
    ) -> RbacResult<bool> {
        let user = self.user(kc_user_id).await?;
        if !user.enabled {
            return Ok(false);
        }

        let mut checked = HashSet::new();
        for (role_type, role) in self.typed_roles(&user, workspace_id).await? {
            for permission_id in self.permissions.role_permissions(role_type, role.id).await? {
                if !checked.insert(permission_id.clone()) {
                    continue;
                }
                let mappings = self.permissions.permission_actions(&permission_id).await?;
                if mappings.iter().any(|m| m.authorizes(action)) {
                    debug!(role = %role.name, permission = %permission_id, "Action granted");
                    return Ok(true);
                }
            }
        }

        debug!(user_id = user.id, "No role maps to the requested action");
        Ok(false)
    }

    /// Union of permission ids held by the user.
    ///
    /// Disabled users resolve to an empty set.
    #[instrument(skip(self))]
    pub async fn resolve_permissions(
        &self,
        kc_user_id: &str,
        workspace_id: Option<u64>,
    ) -> RbacResult<PermissionSet> {
        let user = self.user(kc_user_id).await?;
        let mut set = PermissionSet::new();
        if !user.enabled {
            return Ok(set);
        }

        for (role_type, role) in self.typed_roles(&user, workspace_id).await? {
            set.add_all(self.permissions.role_permissions(role_type, role.id).await?);
        }
        Ok(set)
    }

    /// Union of action names authorized for the user.
    pub async fn resolve_actions(
        &self,
        kc_user_id: &str,
        workspace_id: Option<u64>,
    ) -> RbacResult<BTreeSet<String>> {
        let permissions = self.resolve_permissions(kc_user_id, workspace_id).await?;

        let mut actions = BTreeSet::new();
        for permission_id in permissions.iter() {
            for mapping in self.permissions.permission_actions(permission_id).await? {
                actions.insert(mapping.action_name);
            }
        }
        Ok(actions)
    }

    /// Platform roles, or workspace roles when `workspace_id` is set, that
    /// carry the matching type tag.
    async fn scoped_roles(&self, user: &User, workspace_id: Option<u64>) -> RbacResult<Vec<RoleMaster>> {
        let (role_type, roles) = match workspace_id {
            None => (RoleType::Platform, self.roles.user_platform_roles(user.id).await?),
            Some(ws) => (
                RoleType::Workspace,
                self.roles.user_workspace_roles(user.id, ws).await?,
            ),
        };

        Ok(roles
            .into_iter()
            .filter(|role| {
                let tagged = role.has_type(role_type);
                if !tagged {
                    debug!(role = %role.name, %role_type, "Role lacks type tag, skipping");
                }
                tagged
            })
            .collect())
    }

    async fn typed_roles(
        &self,
        user: &User,
        workspace_id: Option<u64>,
    ) -> RbacResult<Vec<(RoleType, RoleMaster)>> {
        let mut roles: Vec<(RoleType, RoleMaster)> = self
            .scoped_roles(user, None)
            .await?
            .into_iter()
            .map(|r| (RoleType::Platform, r))
            .collect();

        if let Some(ws) = workspace_id {
            roles.extend(
                self.scoped_roles(user, Some(ws))
                    .await?
                    .into_iter()
                    .map(|r| (RoleType::Workspace, r)),
            );
        }
        Ok(roles)
    }
}
