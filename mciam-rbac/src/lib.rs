//! # MC-IAM RBAC (Role-Based Access Control)
//!
//! This crate resolves a user's role grants into permissions and backend
//! actions for the MC-IAM authorization path.
//!
//! ## Overview
//!
//! The mciam-rbac crate handles:
//! - **Permissions**: `framework:resource_type:action[:resource_id]` ids
//! - **Role grants**: `(role_type, role_id, permission_id)` triples
//! - **Actions**: Backend API actions a permission authorizes
//! - **Repositories**: Read-only seams over the role / permission tables
//! - **Resolver**: Basic-access and action checks over all of a user's roles
//!
//! ## Architecture
//!
//! ```text
//! User ─┬─ platform roles ──────────┐
//!       └─ workspace roles (ws id) ─┴─→ RolePermission ─→ permission id
//!                                                           └─→ ApiPermissionActionMapping ─→ action name
//! ```
//!
//! Grants only add up. There is no deny rule and no inheritance through the
//! role tree.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mciam_rbac::{InMemoryDirectory, PermissionResolver};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), mciam_rbac::RbacError> {
//! let directory = InMemoryDirectory::new();
//! let resolver = PermissionResolver::new(Arc::new(directory.clone()), Arc::new(directory));
//!
//! if resolver.has_permission("kc-subject", Some(3), "CreateVm").await? {
//!     // allowed
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Basic Access
//!
//! A user has basic access when any platform role holds either a
//! `menu:menu:view:*` permission or `mc-iam-manager:workspace:read`.

pub mod actions;
pub mod error;
pub mod memory;
pub mod permissions;
pub mod repository;
pub mod resolver;

// Re-export main types for convenience
pub use actions::{ApiAction, ApiPermissionActionMapping};
pub use error::{RbacError, RbacResult, RepositoryError, RepositoryResult};
pub use memory::InMemoryDirectory;
pub use permissions::{
    grants_basic_access, Permission, PermissionSet, RolePermission, MENU_VIEW_PERMISSION_PREFIX,
    WORKSPACE_READ_PERMISSION,
};
pub use repository::{PermissionRepository, RoleRepository};
pub use resolver::PermissionResolver;
