//! Stored workspace tickets
//!
//! A ticket is written once when a user enters a workspace. Afterwards only
//! `last_used_at` moves; role changes produce a new ticket instead of
//! editing this one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted record of an issued workspace ticket.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use mciam_org::WorkspaceTicket;
///
/// let ticket = WorkspaceTicket::new(
///     "kc-subject",
///     3,
///     "eyJhbGciOi...",
///     vec!["menu:menu:view:dashboard".to_string()],
///     Utc::now() + Duration::minutes(30),
/// );
/// assert!(!ticket.is_expired());
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceTicket {
    /// Record id
    pub id: Uuid,

    /// Identity-provider subject of the holder
    pub kc_user_id: String,

    /// Workspace the ticket is scoped to
    pub workspace_id: u64,

    /// Encoded ticket
    pub ticket: String,

    /// Permission ids resolved at issuance
    pub permissions: Vec<String>,

    /// Hard expiry
    pub expires_at: DateTime<Utc>,

    /// Last successful validation
    pub last_used_at: DateTime<Utc>,

    /// Issuance time
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for WorkspaceTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceTicket")
            .field("id", &self.id)
            .field("kc_user_id", &self.kc_user_id)
            .field("workspace_id", &self.workspace_id)
            .field("ticket", &"[REDACTED]")
            .field("permissions", &self.permissions)
            .field("expires_at", &self.expires_at)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

impl WorkspaceTicket {
    /// Create a ticket record issued now.
    pub fn new(
        kc_user_id: impl Into<String>,
        workspace_id: u64,
        ticket: impl Into<String>,
        permissions: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            kc_user_id: kc_user_id.into(),
            workspace_id,
            ticket: ticket.into(),
            permissions,
            expires_at,
            last_used_at: now,
            created_at: now,
        }
    }

    /// Whether the ticket is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the ticket is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the ticket expires within `window` from now.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_at - Utc::now() <= window
    }

    /// Record a successful use.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_used_at = at;
    }
}
