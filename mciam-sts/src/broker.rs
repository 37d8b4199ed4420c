//! Multi-provider credential broker
//!
//! Maps the caller's workspace roles to a target role per requested cloud,
//! runs the exchanges concurrently and aggregates the outcome. One provider
//! being unmapped, unimplemented or failing never fails the whole call;
//! only a request that yields no credentials at all is an error.

use futures::future::join_all;
use mciam_auth::IamClaims;
use mciam_org::{AuthMethod, CspRole, CspType, RoleMaster, RoleType};
use mciam_rbac::RoleRepository;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::alibaba::AlibabaStsProvider;
use crate::aws::AwsStsProvider;
use crate::config::StsConfig;
use crate::credential::{CredentialResponse, FailedProvider, ProviderCredential};
use crate::error::{StsError, StsResult};
use crate::provider::{CspCredentialProvider, FederationRequest, UnimplementedProvider};

/// Default budget for one provider exchange, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchanges a validated identity for temporary credentials in each
/// requested cloud.
#[derive(Clone)]
pub struct CspCredentialBroker {
    roles: Arc<dyn RoleRepository>,
    providers: BTreeMap<CspType, Arc<dyn CspCredentialProvider>>,
    call_timeout: Duration,
}

impl std::fmt::Debug for CspCredentialBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CspCredentialBroker")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl CspCredentialBroker {
    /// Create a broker with no providers registered.
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self {
            roles,
            providers: BTreeMap::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Create a broker with AWS and Alibaba exchanges and GCP / Azure
    /// placeholders.
    ///
    /// The per-provider budget covers every attempt at the full client
    /// timeout plus the longest pause between attempts.
    pub fn from_config(roles: Arc<dyn RoleRepository>, config: &StsConfig) -> StsResult<Self> {
        Ok(Self::new(roles)
            .with_provider(Arc::new(AwsStsProvider::new(config)?))
            .with_provider(Arc::new(AlibabaStsProvider::new(config)?))
            .with_provider(Arc::new(UnimplementedProvider::new(CspType::Gcp)))
            .with_provider(Arc::new(UnimplementedProvider::new(CspType::Azure)))
            .with_call_timeout(call_budget(config)))
    }

    /// Register a provider, replacing any previous one for the same cloud.
    pub fn with_provider(mut self, provider: Arc<dyn CspCredentialProvider>) -> Self {
        self.providers.insert(provider.csp_type(), provider);
        self
    }

    /// Set the budget for one provider exchange.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Clouds with a registered provider.
    pub fn providers(&self) -> Vec<CspType> {
        self.providers.keys().copied().collect()
    }

    /// Exchange the caller's identity token for credentials in each
    /// requested cloud.
    ///
    /// An empty `requested` list means every registered provider. Duplicates
    /// are ignored. Providers without an implementation, role mapping, CSP
    /// role or required configuration land in `unsupported_providers`;
    /// providers whose exchange fails or times out land in
    /// `failed_providers`. Both lists follow request order.
    ///
    /// # Errors
    ///
    /// - [`StsError::UnknownUser`] / [`StsError::UserDisabled`] for the caller
    /// - [`StsError::Repository`] when the role store cannot be read
    /// - [`StsError::NoProviderResolved`] when no provider produced
    ///   credentials, carrying every failure reason
    #[instrument(skip(self, identity_token, claims), fields(subject = %claims.sub))]
    pub async fn get_credentials(
        &self,
        identity_token: &str,
        claims: &IamClaims,
        workspace_id: u64,
        requested: &[CspType],
    ) -> StsResult<CredentialResponse> {
        let user = self
            .roles
            .find_user_by_kc_id(&claims.sub)
            .await?
            .ok_or(StsError::UnknownUser)?;
        if !user.enabled {
            return Err(StsError::UserDisabled);
        }

        let mut workspace_roles: Vec<RoleMaster> = self
            .roles
            .user_workspace_roles(user.id, workspace_id)
            .await?
            .into_iter()
            .filter(|role| role.has_type(RoleType::Workspace))
            .collect();
        workspace_roles.sort_by_key(|role| role.id);

        let order = self.requested_providers(requested);
        let mut response = CredentialResponse::default();
        let mut ready = Vec::new();

        for &csp_type in &order {
            let Some(provider) = self.providers.get(&csp_type) else {
                debug!(provider = %csp_type, "No provider registered");
                response.unsupported_providers.push(csp_type);
                continue;
            };

            let Some(csp_role) = self.target_role(&workspace_roles, csp_type).await? else {
                response.unsupported_providers.push(csp_type);
                continue;
            };

            let request = FederationRequest::new(identity_token, user.username.as_str(), csp_role.role_arn)
                .with_idp_identifier(csp_role.idp_identifier);
            if let Err(e) = provider.check_request(&request) {
                warn!(provider = %csp_type, error = %e, "Provider not configured for target role");
                response.unsupported_providers.push(csp_type);
                continue;
            }
            ready.push((csp_type, Arc::clone(provider), request));
        }

        let calls = ready.iter().map(|(csp_type, provider, request)| async move {
            let outcome = match timeout(self.call_timeout, provider.exchange(request)).await {
                Ok(result) => result,
                Err(_) => Err(StsError::Timeout {
                    provider: *csp_type,
                    after: self.call_timeout,
                }),
            };
            (*csp_type, outcome)
        });

        for (csp_type, outcome) in join_all(calls).await {
            match outcome {
                Ok(Some(credential)) => response.csp_credentials.push(ProviderCredential {
                    provider: csp_type,
                    credential,
                }),
                Ok(None) => {
                    info!(provider = %csp_type, "Credential exchange not yet implemented");
                    response.unsupported_providers.push(csp_type);
                }
                Err(e) => {
                    warn!(provider = %csp_type, error = %e, "Credential exchange failed");
                    response.failed_providers.push(FailedProvider {
                        provider: csp_type,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Placeholders report after the unmapped providers; restore request order
        response
            .unsupported_providers
            .sort_by_key(|csp| order.iter().position(|requested| requested == csp));

        if response.csp_credentials.is_empty() {
            warn!(
                unsupported = response.unsupported_providers.len(),
                failed = response.failed_providers.len(),
                "No provider produced credentials"
            );
            return Err(StsError::NoProviderResolved {
                unsupported: response.unsupported_providers,
                failed: response.failed_providers,
            });
        }

        debug!(
            issued = response.csp_credentials.len(),
            unsupported = response.unsupported_providers.len(),
            failed = response.failed_providers.len(),
            "Credential exchange complete"
        );
        Ok(response)
    }

    fn requested_providers(&self, requested: &[CspType]) -> Vec<CspType> {
        if requested.is_empty() {
            return self.providers();
        }
        let mut seen = HashSet::new();
        requested.iter().copied().filter(|csp| seen.insert(*csp)).collect()
    }

    /// First usable OIDC-mapped CSP role over the roles, in role id order.
    ///
    /// Mappings to a missing CSP role or to another provider's role are
    /// skipped.
    async fn target_role(&self, roles: &[RoleMaster], csp_type: CspType) -> StsResult<Option<CspRole>> {
        for role in roles {
            let mappings = self
                .roles
                .csp_role_mappings(role.id, AuthMethod::Oidc, csp_type)
                .await?;

            for mapping in &mappings {
                match self.roles.find_csp_role(mapping.csp_role_id).await? {
                    Some(csp_role) if csp_role.csp_type == csp_type => {
                        debug!(provider = %csp_type, role = %role.name, csp_role = %csp_role.name, "Target role resolved");
                        return Ok(Some(csp_role));
                    }
                    Some(csp_role) => warn!(
                        provider = %csp_type,
                        csp_role_id = csp_role.id,
                        actual = %csp_role.csp_type,
                        "Mapped CSP role belongs to another provider"
                    ),
                    None => warn!(provider = %csp_type, csp_role_id = mapping.csp_role_id, "Mapped CSP role not found"),
                }
            }
        }

        debug!(provider = %csp_type, "No usable role mapping for provider");
        Ok(None)
    }
}

/// Budget for one provider exchange under `config`, retries included.
fn call_budget(config: &StsConfig) -> Duration {
    let retry = config.retry();
    let attempts = retry.max_attempts.max(1);
    config.timeout() * attempts + retry.max_delay * (attempts - 1)
}
