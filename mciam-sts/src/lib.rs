//! # MC-IAM STS
//!
//! This crate exchanges a validated identity token for short-lived cloud
//! credentials through each provider's web-identity federation endpoint.
//!
//! ## Overview
//!
//! The mciam-sts crate handles:
//! - **Broker**: Role targeting per workspace and partial-success aggregation
//! - **AWS**: `AssumeRoleWithWebIdentity` (GET, query parameters, XML)
//! - **Alibaba**: `AssumeRoleWithOIDC` (POST, form body, `x-acs-*` headers, XML)
//! - **Placeholders**: GCP and Azure, reported as unsupported
//! - **Retry**: Bounded backoff for transport failures only
//!
//! ## Architecture
//!
//! ```text
//! get_credentials(token, claims, workspace, [aws, alibaba, gcp])
//!        │
//!        ├─ RoleRepository: workspace roles ─→ OIDC mapping ─→ CspRole (ARN)
//!        │
//!        ├─ aws      ─→ AwsStsProvider      ─┐
//!        ├─ alibaba  ─→ AlibabaStsProvider  ─┼─ join_all, per-call timeout
//!        └─ gcp      ─→ UnimplementedProvider┘
//!                                              │
//!        { cspCredentials, unsupportedProviders, failedProviders }
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mciam_org::CspType;
//! use mciam_rbac::InMemoryDirectory;
//! use mciam_sts::{CspCredentialBroker, StsConfig};
//! use std::sync::Arc;
//!
//! # async fn example(token: &str, claims: mciam_auth::IamClaims) -> mciam_sts::StsResult<()> {
//! let config = StsConfig::from_env();
//! let broker = CspCredentialBroker::from_config(Arc::new(InMemoryDirectory::new()), &config)?;
//!
//! let response = broker
//!     .get_credentials(token, &claims, 3, &[CspType::Aws, CspType::Alibaba])
//!     .await?;
//! for entry in &response.csp_credentials {
//!     println!("{}: {}", entry.provider, entry.credential.access_key_id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cross-crate Integration
//!
//! This crate integrates with:
//! - `mciam-org`: CSP types, CSP roles and role mappings
//! - `mciam-rbac`: Role repository for workspace role lookup
//! - `mciam-auth`: Validated claims in, `AuthError` out

pub mod alibaba;
pub mod aws;
pub mod broker;
pub mod config;
pub mod credential;
pub mod error;
pub mod provider;
pub mod retry;

// Re-export main types for convenience
pub use alibaba::AlibabaStsProvider;
pub use aws::AwsStsProvider;
pub use broker::{CspCredentialBroker, DEFAULT_CALL_TIMEOUT};
pub use config::StsConfig;
pub use credential::{CredentialResponse, CspCredential, FailedProvider, ProviderCredential};
pub use error::{StsError, StsResult};
pub use provider::{
    supported_providers, CspCredentialProvider, FederationRequest, SupportedProvider, UnimplementedProvider,
};
pub use retry::RetryConfig;
