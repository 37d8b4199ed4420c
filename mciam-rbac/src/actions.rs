//! # Actions
//!
//! Backend API actions and their mapping to permissions.
//! A permission authorizes one or more concrete API actions.

use serde::{Deserialize, Serialize};

/// A concrete backend operation (one method + path of one service).
///
/// # Example
///
/// ```
/// use mciam_rbac::actions::ApiAction;
///
/// let action = ApiAction::new(12, "mc-infra-manager", "GetVm", "GET", "/ns/{nsId}/vm/{vmId}");
/// assert_eq!(action.method, "GET");
/// assert_eq!(action.endpoint(), "GET /ns/{nsId}/vm/{vmId}");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiAction {
    /// Action id
    pub id: u64,
    /// Owning backend service
    pub service_name: String,
    /// Unique action name used in permission checks
    pub action_name: String,
    /// HTTP method, upper case
    pub method: String,
    /// Path template
    pub resource_path: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

impl ApiAction {
    /// Create an action.
    pub fn new(
        id: u64,
        service_name: impl Into<String>,
        action_name: impl Into<String>,
        method: impl Into<String>,
        resource_path: impl Into<String>,
    ) -> Self {
        Self {
            id,
            service_name: service_name.into(),
            action_name: action_name.into(),
            method: method.into().to_ascii_uppercase(),
            resource_path: resource_path.into(),
            description: String::new(),
        }
    }

    /// `METHOD path` string for logs.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.resource_path)
    }
}

/// Link from a permission to an action it authorizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ApiPermissionActionMapping {
    /// Authorizing permission id
    pub permission_id: String,
    /// Authorized action id
    pub action_id: u64,
    /// Authorized action name (denormalized from [`ApiAction`])
    pub action_name: String,
}

impl ApiPermissionActionMapping {
    /// Create a mapping from a permission to an action.
    pub fn new(permission_id: impl Into<String>, action: &ApiAction) -> Self {
        Self {
            permission_id: permission_id.into(),
            action_id: action.id,
            action_name: action.action_name.clone(),
        }
    }

    /// Whether this mapping authorizes the named action.
    pub fn authorizes(&self, action_name: &str) -> bool {
        self.action_name == action_name
    }
}
