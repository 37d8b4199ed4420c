//! Local mirror of identity-provider users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the identity provider.
///
/// The identity provider owns the record; the local copy is keyed by the
/// provider's subject id and only read here.
///
/// # Examples
///
/// ```
/// use mciam_org::User;
///
/// let user = User::new(42, "0b5c-kc-subject", "alice").with_email("alice@example.com");
/// assert!(user.enabled);
/// assert_eq!(user.kc_user_id, "0b5c-kc-subject");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Local database id
    pub id: u64,

    /// Identity-provider subject (`sub` claim)
    pub kc_user_id: String,

    /// Login name (`preferred_username` claim)
    pub username: String,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the account may authenticate
    pub enabled: bool,

    /// When the mirror row was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an enabled user.
    pub fn new(id: u64, kc_user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id,
            kc_user_id: kc_user_id.into(),
            username: username.into(),
            email: None,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Mark the user disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
