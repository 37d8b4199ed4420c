//! # MC-IAM Domain Model
//!
//! This crate provides the identity, role and ticket records shared by the
//! MC-IAM authorization and credential-federation crates.
//!
//! ## Overview
//!
//! The mciam-org crate handles:
//! - **Users**: Local mirror of identity-provider subjects
//! - **Roles**: Role nodes tagged with one or more role types
//! - **Memberships**: Platform and workspace role grants
//! - **CSP roles**: External cloud roles and their bindings to internal roles
//! - **Tickets**: Stored workspace tickets
//!
//! ## Architecture
//!
//! ```text
//! User
//!   ├─ UserPlatformRole ──→ RoleMaster ─┬─ RoleSub(platform | workspace | csp)
//!   └─ UserWorkspaceRole ─→ RoleMaster  └─ RoleMasterCspRoleMapping ─→ CspRole
//!        (workspace id)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mciam_org::{RoleMaster, RoleType, User, UserWorkspaceRole};
//!
//! let user = User::new(1, "kc-subject", "alice");
//!
//! let operator = RoleMaster::new(3, "operator", RoleType::Workspace).with_type(RoleType::Csp);
//! let grant = UserWorkspaceRole::new(user.id, 10, operator.id);
//! ```
//!
//! ## Cross-Crate Integration
//!
//! This crate is designed to work with:
//! - `mciam-rbac`: Permission grants and resolution over these records
//! - `mciam-auth`: Token validation, permission gate and workspace tickets
//! - `mciam-sts`: CSP credential brokering through role mappings

pub mod csp;
pub mod membership;
pub mod roles;
pub mod ticket;
pub mod user;

// Re-export main types for convenience
pub use csp::{AuthMethod, CspRole, CspType, RoleMasterCspRoleMapping, CSP_ROLE_NAME_PREFIX};
pub use membership::{UserPlatformRole, UserWorkspaceRole};
pub use roles::{RoleMaster, RoleSub, RoleType};
pub use ticket::WorkspaceTicket;
pub use user::User;
