//! # MC-IAM Authentication
//!
//! This crate verifies identity-provider tokens, gates requests by role and
//! permission, and issues workspace tickets.
//!
//! ## Overview
//!
//! The mciam-auth crate handles:
//! - **Validation**: RS256/384/512 tokens checked against a cached JWKS
//! - **Claims**: Keycloak realm roles, client roles and UMA permissions
//! - **Gate**: Three enforcement levels over [`mciam_rbac::PermissionResolver`]
//! - **Tickets**: Workspace-scoped tokens embedding a permission snapshot
//! - **Errors**: One taxonomy with stable HTTP status and error codes
//!
//! ## Architecture
//!
//! ```text
//! Authorization: Bearer ─→ TokenValidator ─→ IamClaims ─→ PermissionGate ─→ handler
//!                              ▲                               │
//!                          JWKS (RwLock)                 PermissionResolver
//!
//! X-Workspace-Ticket ─→ WorkspaceTicketService::validate ─→ (workspace id, permission entry)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mciam_auth::{bearer_token, AuthConfig, GateLevel, PermissionGate, RequestContext, TokenValidator};
//! use mciam_rbac::{InMemoryDirectory, PermissionResolver};
//! use std::sync::Arc;
//!
//! # async fn example(header: &str) -> mciam_auth::AuthResult<()> {
//! let config = AuthConfig::from_env();
//! config.validate()?;
//!
//! let validator = TokenValidator::from_config(&config)?;
//! validator.load_key_set(&config.certs_url()).await?;
//!
//! let directory = InMemoryDirectory::new();
//! let gate = PermissionGate::new(PermissionResolver::new(
//!     Arc::new(directory.clone()),
//!     Arc::new(directory),
//! ));
//!
//! let claims = validator.validate(bearer_token(header)?).await?;
//! let ctx = RequestContext::authenticated(claims).with_workspace(3);
//! gate.authorize(&GateLevel::permission("CreateVm"), &ctx).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cross-crate Integration
//!
//! This crate integrates with:
//! - `mciam-org`: User and workspace ticket records
//! - `mciam-rbac`: Permission resolution behind the gate and tickets
//! - `mciam-sts`: Consumes validated claims for CSP credential exchange

pub mod claims;
pub mod config;
pub mod error;
pub mod gate;
pub mod issuer;
pub mod jwks;
pub mod ticket;
pub mod validator;

// Re-export main types for convenience
pub use claims::{AuthorizationClaim, Audience, IamClaims, RoleClaim, UmaPermission, WORKSPACE_RESOURCE};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, AuthResult};
pub use gate::{Authorization, GateLevel, PermissionGate, RequestContext, DEFAULT_ADMIN_ROLES};
pub use issuer::{
    IssuedTicket, KeycloakTicketIssuer, SignedTicketIssuer, TicketAlgorithm, TicketIssuer, TicketRequest,
};
pub use jwks::{Jwk, JwkSet};
pub use ticket::{
    InMemoryTicketStore, TicketStore, ValidatedTicket, WorkspaceTicketService, WORKSPACE_TICKET_HEADER,
};
pub use validator::{bearer_token, TokenValidator};

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
