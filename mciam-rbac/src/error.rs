//! Error types for repository reads and permission resolution

use thiserror::Error;

/// Failure reading the role / permission store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Store could not be reached or is temporarily unusable
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Query failed or returned malformed data
    #[error("Repository query failed: {0}")]
    Query(String),

    /// Write violated a uniqueness constraint
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Failure resolving a user's permissions.
///
/// Neither variant means "denied": a user without a qualifying role
/// resolves to `Ok(false)`.
#[derive(Debug, Error)]
pub enum RbacError {
    /// A validated identity has no local user record
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Underlying store read failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RbacError {
    /// Whether the caller may retry the same resolution.
    ///
    /// Store failures are always retryable from the caller's side; a
    /// missing user is a data problem and is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RbacError::Repository(_))
    }
}

/// Result type for permission resolution.
pub type RbacResult<T> = Result<T, RbacError>;
