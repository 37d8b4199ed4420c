//! Tiered permission gate
//!
//! Each route is guarded at exactly one [`GateLevel`]:
//!
//! ```text
//! Unauthenticated ──(validated token)──→ Authenticated ──┬─ Level 1 ─────────────────────→ Authorized
//!                                                        ├─ Level 2: admin role | basic ──→ Authorized | Forbidden
//!                                                        └─ Level 3: HasPermission(action) → Authorized | Forbidden
//! ```
//!
//! Every check is terminal for the request; there is no retry state.

use mciam_rbac::PermissionResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

use crate::claims::IamClaims;
use crate::error::{AuthError, AuthResult};

/// Realm roles that pass Level 2 without a permission lookup.
pub const DEFAULT_ADMIN_ROLES: [&str; 2] = ["platformAdmin", "admin"];

/// Enforcement level of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "level", content = "action")]
pub enum GateLevel {
    /// A validated token is enough
    Authenticated,
    /// Administrator role or basic console access
    BasicAccess,
    /// The named action must be granted
    Permission(String),
}

impl GateLevel {
    /// Level 3 for an action.
    pub fn permission(action: impl Into<String>) -> Self {
        GateLevel::Permission(action.into())
    }
}

/// What the gate knows about a request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Claims of the validated bearer token, if any
    pub claims: Option<IamClaims>,
    /// Workspace taken from the request path
    pub workspace_id: Option<u64>,
}

impl RequestContext {
    /// A request without a validated token.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A request carrying validated claims.
    pub fn authenticated(claims: IamClaims) -> Self {
        Self {
            claims: Some(claims),
            workspace_id: None,
        }
    }

    /// Scope the request to a workspace.
    pub fn with_workspace(mut self, workspace_id: u64) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }
}

/// A successful gate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorization {
    /// Identity-provider subject
    pub subject: String,
    /// Login name
    pub username: String,
    /// Level the request passed
    pub level: GateLevel,
    /// Workspace the decision was scoped to
    pub workspace_id: Option<u64>,
    /// Passed through the administrator role set
    pub via_admin_role: bool,
}

/// Gates requests at one of three levels.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    resolver: PermissionResolver,
    admin_roles: HashSet<String>,
}

impl PermissionGate {
    /// Create a gate with the default administrator roles.
    pub fn new(resolver: PermissionResolver) -> Self {
        Self {
            resolver,
            admin_roles: DEFAULT_ADMIN_ROLES.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Replace the administrator role set.
    pub fn with_admin_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// The resolver this gate delegates to.
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Whether the token carries an administrator realm role.
    pub fn is_admin(&self, claims: &IamClaims) -> bool {
        claims.realm_roles().iter().any(|r| self.admin_roles.contains(r))
    }

    /// Decide whether the request may proceed at `level`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] without validated claims
    /// - [`AuthError::Forbidden`] when the level's check fails
    /// - [`AuthError::Infrastructure`] / [`AuthError::Internal`] when the
    ///   role store fails or the subject has no local user
    #[instrument(skip(self, ctx), fields(workspace_id = ?ctx.workspace_id))]
    pub async fn authorize(&self, level: &GateLevel, ctx: &RequestContext) -> AuthResult<Authorization> {
        let claims = ctx
            .claims
            .as_ref()
            .ok_or_else(|| AuthError::Unauthenticated("no validated token on request".to_string()))?;

        let mut via_admin_role = false;
        match level {
            GateLevel::Authenticated => {}
            GateLevel::BasicAccess => {
                if self.is_admin(claims) {
                    via_admin_role = true;
                } else if !self.resolver.has_basic_access(&claims.sub).await? {
                    warn!(subject = %claims.sub, "Basic access denied");
                    return Err(AuthError::Forbidden("no platform access".to_string()));
                }
            }
            GateLevel::Permission(action) => {
                if action.is_empty() {
                    warn!("Route has no action configured, denying");
                    return Err(AuthError::Forbidden("no permission configured for route".to_string()));
                }
                if !self
                    .resolver
                    .has_permission(&claims.sub, ctx.workspace_id, action)
                    .await?
                {
                    warn!(subject = %claims.sub, action = %action, "Permission denied");
                    return Err(AuthError::Forbidden(format!("missing permission for {action}")));
                }
            }
        }

        debug!(subject = %claims.sub, via_admin_role, "Request authorized");
        Ok(Authorization {
            subject: claims.sub.clone(),
            username: claims.username().to_string(),
            level: level.clone(),
            workspace_id: ctx.workspace_id,
            via_admin_role,
        })
    }
}
