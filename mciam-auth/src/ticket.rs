//! Workspace tickets
//!
//! A ticket snapshots a user's resolved permissions for one workspace so
//! downstream calls do not resolve roles again. The snapshot is
//! authoritative until the ticket expires; role changes are picked up by
//! issuing a new ticket, never by editing an old one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mciam_org::WorkspaceTicket;
use mciam_rbac::{PermissionResolver, RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::claims::{IamClaims, UmaPermission, WORKSPACE_RESOURCE};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::issuer::{TicketIssuer, TicketRequest};
use crate::validator::TokenValidator;

/// Header carrying the ticket on workspace-scoped requests.
pub const WORKSPACE_TICKET_HEADER: &str = "X-Workspace-Ticket";

/// Persistence for issued tickets.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Store a ticket, replacing any earlier one for the same user and
    /// workspace.
    async fn save(&self, ticket: WorkspaceTicket) -> RepositoryResult<()>;

    /// Current ticket of a user in a workspace.
    async fn find(&self, kc_user_id: &str, workspace_id: u64) -> RepositoryResult<Option<WorkspaceTicket>>;

    /// Look up a ticket by its encoded value.
    async fn find_by_ticket(&self, ticket: &str) -> RepositoryResult<Option<WorkspaceTicket>>;

    /// Set `last_used_at`. Returns whether a record was found.
    async fn touch(&self, ticket: &str, at: DateTime<Utc>) -> RepositoryResult<bool>;
}

/// In-memory ticket store.
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<RwLock<HashMap<(String, u64), WorkspaceTicket>>>,
    offline: Arc<AtomicBool>,
}

impl std::fmt::Debug for InMemoryTicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTicketStore").finish_non_exhaustive()
    }
}

impl InMemoryTicketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`RepositoryError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> RepositoryResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("ticket store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn save(&self, ticket: WorkspaceTicket) -> RepositoryResult<()> {
        self.check_online()?;
        let mut tickets = self.tickets.write().await;
        tickets.insert((ticket.kc_user_id.clone(), ticket.workspace_id), ticket);
        Ok(())
    }

    async fn find(&self, kc_user_id: &str, workspace_id: u64) -> RepositoryResult<Option<WorkspaceTicket>> {
        self.check_online()?;
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&(kc_user_id.to_string(), workspace_id)).cloned())
    }

    async fn find_by_ticket(&self, ticket: &str) -> RepositoryResult<Option<WorkspaceTicket>> {
        self.check_online()?;
        let tickets = self.tickets.read().await;
        Ok(tickets.values().find(|t| t.ticket == ticket).cloned())
    }

    async fn touch(&self, ticket: &str, at: DateTime<Utc>) -> RepositoryResult<bool> {
        self.check_online()?;
        let mut tickets = self.tickets.write().await;
        match tickets.values_mut().find(|t| t.ticket == ticket) {
            Some(record) => {
                record.touch(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Outcome of validating a ticket.
#[derive(Debug, Clone)]
pub struct ValidatedTicket {
    /// Workspace the ticket is scoped to
    pub workspace_id: u64,
    /// The `rsname == "workspace"` permission entry
    pub permission: UmaPermission,
    /// Full claim set of the ticket
    pub claims: IamClaims,
}

impl ValidatedTicket {
    /// Whether the snapshot includes a permission id.
    pub fn has_permission(&self, permission_id: &str) -> bool {
        self.permission.permissions.iter().any(|p| p == permission_id)
    }
}

/// Issues and validates workspace tickets.
///
/// # Example
///
/// ```rust,no_run
/// use mciam_auth::{InMemoryTicketStore, SignedTicketIssuer, TokenValidator, WorkspaceTicketService};
/// use mciam_rbac::{InMemoryDirectory, PermissionResolver};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(pem: &[u8]) -> mciam_auth::AuthResult<()> {
/// let directory = InMemoryDirectory::new();
/// let resolver = PermissionResolver::new(Arc::new(directory.clone()), Arc::new(directory));
/// let service = WorkspaceTicketService::new(
///     TokenValidator::new(Duration::from_secs(10))?,
///     resolver,
///     Arc::new(SignedTicketIssuer::from_rsa_pem("ticket-key", pem)?),
///     Arc::new(InMemoryTicketStore::new()),
/// );
///
/// let ticket = service.issue_or_reuse("kc-subject", 3).await?;
/// let validated = service.validate(&ticket.ticket).await?;
/// assert_eq!(validated.workspace_id, 3);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorkspaceTicketService {
    validator: TokenValidator,
    resolver: PermissionResolver,
    issuer: Arc<dyn TicketIssuer>,
    store: Arc<dyn TicketStore>,
    ttl: chrono::Duration,
    reissue_window: chrono::Duration,
    touch_timeout: Duration,
}

impl std::fmt::Debug for WorkspaceTicketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceTicketService")
            .field("ttl", &self.ttl)
            .field("reissue_window", &self.reissue_window)
            .finish_non_exhaustive()
    }
}

impl WorkspaceTicketService {
    /// Create a service with a 30 minute lifetime and 1 minute re-issue
    /// window.
    pub fn new(
        validator: TokenValidator,
        resolver: PermissionResolver,
        issuer: Arc<dyn TicketIssuer>,
        store: Arc<dyn TicketStore>,
    ) -> Self {
        let defaults = AuthConfig::default();
        Self {
            validator,
            resolver,
            issuer,
            store,
            ttl: defaults.ticket_ttl(),
            reissue_window: defaults.reissue_window(),
            touch_timeout: Duration::from_millis(250),
        }
    }

    /// Take lifetimes from configuration.
    pub fn with_config(mut self, config: &AuthConfig) -> Self {
        self.ttl = config.ticket_ttl();
        self.reissue_window = config.reissue_window();
        self
    }

    /// Bound how long validation waits on the `last_used_at` write.
    pub fn with_touch_timeout(mut self, timeout: Duration) -> Self {
        self.touch_timeout = timeout;
        self
    }

    /// Issue a new ticket with the user's current permissions.
    pub async fn issue(&self, kc_user_id: &str, workspace_id: u64) -> AuthResult<WorkspaceTicket> {
        self.issue_inner(kc_user_id, workspace_id, None).await
    }

    /// Issue a new ticket, passing the caller's access token to the issuer.
    pub async fn issue_with_subject_token(
        &self,
        kc_user_id: &str,
        workspace_id: u64,
        subject_token: &str,
    ) -> AuthResult<WorkspaceTicket> {
        self.issue_inner(kc_user_id, workspace_id, Some(subject_token.to_string()))
            .await
    }

    /// Return the stored ticket unless it is about to expire, otherwise
    /// issue a new one.
    #[instrument(skip(self))]
    pub async fn issue_or_reuse(&self, kc_user_id: &str, workspace_id: u64) -> AuthResult<WorkspaceTicket> {
        if let Some(existing) = self.store.find(kc_user_id, workspace_id).await? {
            if !existing.expires_within(self.reissue_window) {
                debug!("Reusing stored ticket");
                return Ok(existing);
            }
            debug!(expires_at = %existing.expires_at, "Stored ticket near expiry, re-issuing");
        }
        self.issue(kc_user_id, workspace_id).await
    }

    #[instrument(skip(self, subject_token))]
    async fn issue_inner(
        &self,
        kc_user_id: &str,
        workspace_id: u64,
        subject_token: Option<String>,
    ) -> AuthResult<WorkspaceTicket> {
        let user = self.resolver.user(kc_user_id).await?;
        if !user.enabled {
            warn!(user_id = user.id, "Ticket refused for disabled user");
            return Err(AuthError::Forbidden("user is disabled".to_string()));
        }

        let permissions = self
            .resolver
            .resolve_permissions(kc_user_id, Some(workspace_id))
            .await?
            .to_vec();

        let request = TicketRequest {
            subject: kc_user_id.to_string(),
            username: user.username.clone(),
            workspace_id,
            permissions,
            expires_at: Utc::now() + self.ttl,
            subject_token,
        };
        let issued = self.issuer.issue(&request).await?;

        let record = WorkspaceTicket::new(
            kc_user_id,
            workspace_id,
            issued.token,
            request.permissions,
            issued.expires_at,
        );
        self.store.save(record.clone()).await?;

        info!(permissions = record.permissions.len(), expires_at = %record.expires_at, "Workspace ticket issued");
        Ok(record)
    }

    /// Validate a ticket and return its workspace and permission entry.
    ///
    /// # Errors
    ///
    /// - Authentication errors (401) when the ticket fails signature or
    ///   expiry checks
    /// - [`AuthError::Validation`] (400) when the authorization claim is
    ///   absent, empty, has no `workspace` entry, more than one, or a
    ///   non-numeric `rsid`
    pub async fn validate(&self, ticket: &str) -> AuthResult<ValidatedTicket> {
        let claims = self.validator.validate(ticket).await?;

        let entries = claims.uma_permissions();
        if entries.is_empty() {
            return Err(AuthError::Validation("ticket carries no authorization permissions".to_string()));
        }

        let mut workspace_entries = entries.iter().filter(|p| p.rsname == WORKSPACE_RESOURCE);
        let permission = match (workspace_entries.next(), workspace_entries.next()) {
            (Some(entry), None) => entry.clone(),
            (None, _) => {
                return Err(AuthError::Validation(format!(
                    "no permission entry with rsname \"{WORKSPACE_RESOURCE}\""
                )))
            }
            (Some(_), Some(_)) => {
                return Err(AuthError::Validation("more than one workspace permission entry".to_string()))
            }
        };

        let workspace_id = permission
            .rsid
            .parse::<u64>()
            .map_err(|_| AuthError::Validation(format!("invalid workspace id {:?}", permission.rsid)))?;

        self.touch(ticket).await;

        Ok(ValidatedTicket {
            workspace_id,
            permission,
            claims,
        })
    }

    /// Best-effort `last_used_at` update; never fails validation.
    async fn touch(&self, ticket: &str) {
        match tokio::time::timeout(self.touch_timeout, self.store.touch(ticket, Utc::now())).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!("Validated ticket has no stored record"),
            Ok(Err(err)) => warn!(error = %err, "Failed to record ticket use"),
            Err(_) => warn!("Timed out recording ticket use"),
        }
    }
}
