//! Identity resolution seam.
//!
//! [`IdentityResolver`] is what the lease controller calls. The production
//! implementation is [`super::OAuthIdentityResolver`]; tests substitute their
//! own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::IdpError;
use crate::BrokerResult;
use crate::config::{GroupDelegation, ProviderConfig};
use crate::error::BrokerError;
use crate::token::ProviderToken;

/// Identity reported by the provider's identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Verified email address.
    pub email: String,
    /// Hosted domain hint; empty for consumer accounts.
    #[serde(default)]
    pub domain: String,
}

/// The outcome of one identity resolution. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedIdentity {
    /// Canonical email address.
    pub email: String,
    /// Organizational domain hint; empty when the provider reported none.
    pub domain: String,
    /// Group identifiers (group email addresses).
    pub groups: Vec<String>,
}

impl ResolvedIdentity {
    /// Creates an identity with no domain and no groups.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    /// Sets the domain hint.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the group memberships.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<impl Into<String>>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Exchanges codes and resolves identities against an external provider.
///
/// Each method makes its external calls exactly once; there are no retries.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Exchanges a single-use authorization code for a provider token.
    async fn exchange(&self, config: &ProviderConfig, code: &str)
    -> Result<ProviderToken, IdpError>;

    /// Looks up the identity the token belongs to.
    async fn lookup_identity(&self, token: &ProviderToken) -> Result<ProviderIdentity, IdpError>;

    /// Lists the groups `email` belongs to, using delegated credentials.
    async fn lookup_groups(
        &self,
        delegation: GroupDelegation<'_>,
        email: &str,
    ) -> Result<Vec<String>, IdpError>;

    /// Resolves the token to an identity, adding groups when the
    /// configuration enables group fetching.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::IdentityLookup` or `BrokerError::GroupLookup`
    /// depending on which call failed.
    async fn resolve(
        &self,
        config: &ProviderConfig,
        token: &ProviderToken,
    ) -> BrokerResult<ResolvedIdentity> {
        let identity = self
            .lookup_identity(token)
            .await
            .map_err(BrokerError::IdentityLookup)?;

        let groups = match config.group_delegation() {
            Some(delegation) => self
                .lookup_groups(delegation, &identity.email)
                .await
                .map_err(BrokerError::GroupLookup)?,
            None => Vec::new(),
        };

        tracing::debug!(
            email = %identity.email,
            domain = %identity.domain,
            groups = groups.len(),
            "Resolved identity"
        );

        Ok(ResolvedIdentity {
            email: identity.email,
            domain: identity.domain,
            groups,
        })
    }
}
