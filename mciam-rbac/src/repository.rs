//! Read-side repository seams over the role and permission tables
//!
//! The authorization path only reads. Writes (grants, mappings) belong to
//! the CRUD layer, which is outside this crate.

use async_trait::async_trait;
use mciam_org::{AuthMethod, CspRole, CspType, RoleMaster, RoleMasterCspRoleMapping, RoleType, User};

use crate::actions::ApiPermissionActionMapping;
use crate::error::RepositoryResult;

/// Read access to users, role assignments and CSP role bindings.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Look up a user by identity-provider subject.
    async fn find_user_by_kc_id(&self, kc_user_id: &str) -> RepositoryResult<Option<User>>;

    /// Roles granted to the user platform-wide.
    async fn user_platform_roles(&self, user_id: u64) -> RepositoryResult<Vec<RoleMaster>>;

    /// Roles granted to the user inside one workspace.
    async fn user_workspace_roles(
        &self,
        user_id: u64,
        workspace_id: u64,
    ) -> RepositoryResult<Vec<RoleMaster>>;

    /// CSP bindings of a role for one federation method and cloud.
    async fn csp_role_mappings(
        &self,
        role_id: u64,
        auth_method: AuthMethod,
        csp_type: CspType,
    ) -> RepositoryResult<Vec<RoleMasterCspRoleMapping>>;

    /// Look up a CSP role.
    async fn find_csp_role(&self, csp_role_id: u64) -> RepositoryResult<Option<CspRole>>;
}

/// Read access to permission grants and their action mappings.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Permission ids granted to a role.
    async fn role_permissions(
        &self,
        role_type: RoleType,
        role_id: u64,
    ) -> RepositoryResult<Vec<String>>;

    /// Actions authorized by a permission.
    async fn permission_actions(
        &self,
        permission_id: &str,
    ) -> RepositoryResult<Vec<ApiPermissionActionMapping>>;
}
