//! The broker's operation surface.
//!
//! [`Backend`] exposes every operation a host routes to the broker. Each
//! operation takes typed [`FieldData`] and returns a [`Response`] or a
//! [`BrokerError`].
//!
//! | Operation | Method |
//! |---|---|
//! | write-config | [`Backend::write_config`] |
//! | read-config | [`Backend::read_config`] |
//! | read-authorization-url | [`Backend::authorization_url`] |
//! | upsert-role | [`Backend::upsert_role`] |
//! | read-role | [`Backend::read_role`] |
//! | list-roles | [`Backend::list_roles`] |
//! | delete-role | [`Backend::delete_role`] |
//! | login | [`Backend::login`] |
//! | renew | [`Backend::renew`] |

use std::sync::Arc;

use idbroker_storage::DynStorage;
use serde_json::{Map, Value, json};

use crate::BrokerResult;
use crate::audit::{AuditAction, AuditLog};
use crate::config::ConfigInput;
use crate::error::BrokerError;
use crate::federation::{IdentityResolver, OAuthIdentityResolver, authorization_url};
use crate::fields::FieldData;
use crate::lease::{INTERNAL_ROLE, Lease, LeaseController};
use crate::role::{RoleInput, normalize_name};
use crate::settings::{BrokerSettings, SettingsError};
use crate::storage::{BrokerStore, CONFIG_KEY};

/// The result of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Nothing to return.
    Empty,
    /// A map of named values.
    Data(Map<String, Value>),
    /// A list of keys.
    List(Vec<String>),
    /// An issued or renewed lease.
    Auth(Lease),
}

impl Response {
    /// Returns the data map, if this is a data response.
    #[must_use]
    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Data(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the keys, if this is a list response.
    #[must_use]
    pub fn keys(&self) -> Option<&[String]> {
        match self {
            Self::List(keys) => Some(keys),
            _ => None,
        }
    }

    /// Returns the lease, if this is an auth response.
    #[must_use]
    pub fn lease(&self) -> Option<&Lease> {
        match self {
            Self::Auth(lease) => Some(lease),
            _ => None,
        }
    }

    /// Consumes the response and returns its lease.
    #[must_use]
    pub fn into_lease(self) -> Option<Lease> {
        match self {
            Self::Auth(lease) => Some(lease),
            _ => None,
        }
    }

    /// Returns `true` for an empty response.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// The identity broker.
#[derive(Clone)]
pub struct Backend {
    settings: BrokerSettings,
    store: BrokerStore,
    leases: LeaseController,
    audit: AuditLog,
}

impl Backend {
    /// Creates a broker that talks to the provider configured in `settings`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or the HTTP client
    /// cannot be built.
    pub fn new(settings: BrokerSettings, storage: DynStorage) -> Result<Self, SettingsError> {
        settings.validate()?;
        let resolver =
            OAuthIdentityResolver::new(settings.http_client()?, settings.provider.clone());
        Ok(Self::with_resolver(settings, storage, Arc::new(resolver)))
    }

    /// Creates a broker with a caller-supplied identity resolver.
    #[must_use]
    pub fn with_resolver(
        settings: BrokerSettings,
        storage: DynStorage,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let store = BrokerStore::new(storage);
        Self {
            leases: LeaseController::new(store.clone(), resolver),
            audit: AuditLog::new(settings.audit.clone()),
            store,
            settings,
        }
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Validates and stores the provider configuration, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Validation` without touching storage if any
    /// field is invalid.
    pub async fn write_config(&self, fields: &FieldData) -> BrokerResult<Response> {
        let config = ConfigInput::parse(fields)?;
        self.store.put_config(&config).await?;

        tracing::info!(
            client_id = %config.client_id,
            fetch_groups = config.fetch_groups,
            "Provider configuration written"
        );
        self.audit.admin_change(AuditAction::ConfigWritten, CONFIG_KEY);
        Ok(Response::Empty)
    }

    /// Returns the provider configuration without its secrets.
    ///
    /// Absent configuration yields [`Response::Empty`].
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn read_config(&self) -> BrokerResult<Response> {
        Ok(match self.store.config().await? {
            Some(config) => Response::Data(config.public_view()),
            None => Response::Empty,
        })
    }

    /// Returns the provider consent page URL under the `url` key.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::ConfigMissing` if no configuration was written.
    pub async fn authorization_url(&self) -> BrokerResult<Response> {
        let config = self.store.config().await?.ok_or(BrokerError::ConfigMissing)?;
        let url = authorization_url(&self.settings.provider, &config)
            .map_err(|e| BrokerError::internal(format!("authorization endpoint: {e}")))?;
        Ok(Response::Data(object(json!({ "url": url.as_str() }))))
    }

    /// Validates and stores a role, replacing any previous definition.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Validation` without touching storage if any
    /// field is invalid.
    pub async fn upsert_role(&self, fields: &FieldData) -> BrokerResult<Response> {
        let RoleInput { name, role } = RoleInput::parse(fields)?;
        self.store.put_role(&name, &role).await?;

        tracing::info!(role = %name, policies = ?role.policies, "Role written");
        self.audit.admin_change(AuditAction::RoleWritten, &name);
        Ok(Response::Empty)
    }

    /// Returns a role, with durations in whole seconds.
    ///
    /// An absent role yields [`Response::Empty`].
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Validation` if `name` is missing.
    pub async fn read_role(&self, fields: &FieldData) -> BrokerResult<Response> {
        let name = normalize_name(&fields.required_string("name")?);
        let Some(role) = self.store.role(&name).await? else {
            return Ok(Response::Empty);
        };

        Ok(Response::Data(object(json!({
            "name": name,
            "policies": role.policies,
            "bound_emails": role.bound_emails,
            "bound_groups": role.bound_groups,
            "bound_domain": role.bound_domain.unwrap_or_default(),
            "ttl": role.ttl.as_secs(),
            "max_ttl": role.max_ttl.as_secs(),
        }))))
    }

    /// Lists role names.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn list_roles(&self) -> BrokerResult<Response> {
        Ok(Response::List(self.store.list_roles().await?))
    }

    /// Deletes a role. Deleting an absent role succeeds.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Validation` if `name` is missing.
    pub async fn delete_role(&self, fields: &FieldData) -> BrokerResult<Response> {
        let name = normalize_name(&fields.required_string("name")?);
        self.store.delete_role(&name).await?;

        tracing::info!(role = %name, "Role deleted");
        self.audit.admin_change(AuditAction::RoleDeleted, &name);
        Ok(Response::Empty)
    }

    /// Logs in with an authorization `code` under `role`.
    ///
    /// # Errors
    ///
    /// See [`LeaseController::login`].
    pub async fn login(&self, fields: &FieldData) -> BrokerResult<Response> {
        let role = fields.required_string("role");
        let result = match (&role, fields.required_string("code")) {
            (Ok(role), Ok(code)) => self.leases.login(&code, role).await,
            (Err(e), _) => Err(e.clone().into()),
            (Ok(_), Err(e)) => Err(e.into()),
        };

        match result {
            Ok(lease) => {
                let role = lease.internal_data.get(INTERNAL_ROLE).map_or("", String::as_str);
                self.audit
                    .auth_succeeded(AuditAction::LoginSucceeded, role, &lease.display_name);
                Ok(Response::Auth(lease))
            }
            Err(e) => {
                self.audit
                    .auth_failed(AuditAction::LoginFailed, role.as_deref().ok(), &e);
                Err(e)
            }
        }
    }

    /// Re-verifies and extends a lease previously issued by [`Backend::login`].
    ///
    /// # Errors
    ///
    /// See [`LeaseController::renew`].
    pub async fn renew(&self, lease: &Lease) -> BrokerResult<Response> {
        let role = lease.internal_data.get(INTERNAL_ROLE).map(String::as_str);
        match self.leases.renew(lease).await {
            Ok(renewed) => {
                self.audit.auth_succeeded(
                    AuditAction::RenewSucceeded,
                    role.unwrap_or(""),
                    &renewed.display_name,
                );
                Ok(Response::Auth(renewed))
            }
            Err(e) => {
                self.audit.auth_failed(AuditAction::RenewFailed, role, &e);
                Err(e)
            }
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
