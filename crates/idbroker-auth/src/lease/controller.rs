//! Login and renewal orchestration.

use std::collections::BTreeMap;
use std::sync::Arc;

use time::OffsetDateTime;

use super::{
    INTERNAL_ROLE, INTERNAL_TOKEN, Lease, LeaseOptions, METADATA_DOMAIN, METADATA_USERNAME,
};
use crate::BrokerResult;
use crate::authz::{authorize, same_policy_set};
use crate::config::ProviderConfig;
use crate::error::BrokerError;
use crate::federation::IdentityResolver;
use crate::role::{Role, normalize_name};
use crate::storage::BrokerStore;
use crate::token::TokenCodec;

/// Issues leases on login and re-verifies them on renewal.
///
/// Holds no state of its own: configuration and roles are read from storage
/// on every call, and no lock is held across provider round trips.
#[derive(Clone)]
pub struct LeaseController {
    store: BrokerStore,
    resolver: Arc<dyn IdentityResolver>,
}

impl LeaseController {
    /// Creates a controller.
    #[must_use]
    pub fn new(store: BrokerStore, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { store, resolver }
    }

    /// Exchanges `code` and issues a lease under `role_name`.
    ///
    /// # Errors
    ///
    /// Returns `RoleNotFound` or `ConfigMissing` before any provider call,
    /// then `Exchange`, `IdentityLookup`, `GroupLookup`, `DomainMismatch` or
    /// `NotAuthorized` as the login progresses.
    pub async fn login(&self, code: &str, role_name: &str) -> BrokerResult<Lease> {
        self.login_at(code, role_name, OffsetDateTime::now_utc()).await
    }

    /// [`LeaseController::login`] with an explicit issue time.
    pub async fn login_at(
        &self,
        code: &str,
        role_name: &str,
        now: OffsetDateTime,
    ) -> BrokerResult<Lease> {
        let role_name = normalize_name(role_name);
        let role_name = role_name.as_str();
        let role = self.load_role(role_name).await?;
        let config = self.load_config().await?;

        let token = self
            .resolver
            .exchange(&config, code)
            .await
            .map_err(BrokerError::Exchange)?;
        let identity = self.resolver.resolve(&config, &token).await?;
        let policies = authorize(role_name, &role, &identity)?;

        let mut metadata =
            BTreeMap::from([(METADATA_USERNAME.to_string(), identity.email.clone())]);
        if !identity.domain.is_empty() {
            metadata.insert(METADATA_DOMAIN.to_string(), identity.domain.clone());
        }

        let internal_data = BTreeMap::from([
            (INTERNAL_TOKEN.to_string(), TokenCodec::encode(&token)?),
            (INTERNAL_ROLE.to_string(), role_name.to_string()),
        ]);

        tracing::info!(
            role = %role_name,
            email = %identity.email,
            policies = ?policies,
            "Issued lease"
        );

        Ok(Lease {
            display_name: identity.email,
            policies,
            metadata,
            internal_data,
            options: LeaseOptions::new(role.ttl, role.max_ttl, now),
        })
    }

    /// Re-verifies `lease` and extends it.
    ///
    /// # Errors
    ///
    /// Returns `MalformedLease` for foreign or corrupt internal data,
    /// `RoleNotFound` if the role was deleted, the resolver errors of login,
    /// `PolicyDrift` if the role now grants a different policy set (including
    /// none at all), and `LeaseExpired` once the maximum lifetime is reached.
    pub async fn renew(&self, lease: &Lease) -> BrokerResult<Lease> {
        self.renew_at(lease, OffsetDateTime::now_utc()).await
    }

    /// [`LeaseController::renew`] with an explicit renewal time.
    pub async fn renew_at(&self, lease: &Lease, now: OffsetDateTime) -> BrokerResult<Lease> {
        let role_name = lease
            .internal_data
            .get(INTERNAL_ROLE)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| BrokerError::malformed_lease("lease has no role"))?;
        let encoded = lease
            .internal_data
            .get(INTERNAL_TOKEN)
            .ok_or_else(|| BrokerError::malformed_lease("lease has no token"))?;
        let token = TokenCodec::decode(encoded)?;

        let role = self.load_role(role_name).await?;
        let config = self.load_config().await?;

        let identity = self.resolver.resolve(&config, &token).await?;

        // A binding that no longer matches grants nothing.
        let policies = match authorize(role_name, &role, &identity) {
            Ok(policies) => policies,
            Err(BrokerError::NotAuthorized { .. } | BrokerError::DomainMismatch { .. }) => {
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if !same_policy_set(&policies, &lease.policies) {
            tracing::warn!(
                role = %role_name,
                email = %identity.email,
                "Policy set changed since lease was issued"
            );
            return Err(BrokerError::policy_drift(lease.policies.clone(), policies));
        }

        let options = lease.options.extend(role.ttl, role.max_ttl, now)?;

        tracing::info!(
            role = %role_name,
            email = %identity.email,
            ttl_secs = options.ttl.as_secs(),
            "Renewed lease"
        );

        Ok(Lease {
            options,
            ..lease.clone()
        })
    }

    async fn load_role(&self, name: &str) -> BrokerResult<Role> {
        self.store
            .role(name)
            .await?
            .ok_or_else(|| BrokerError::role_not_found(name))
    }

    async fn load_config(&self) -> BrokerResult<ProviderConfig> {
        self.store.config().await?.ok_or(BrokerError::ConfigMissing)
    }
}
