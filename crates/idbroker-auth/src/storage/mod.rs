//! Broker state on top of the host key-value storage.
//!
//! Keys:
//!
//! - `config` - the [`ProviderConfig`]
//! - `role/<name>` - one [`Role`] per normalized role name
//!
//! Nothing is cached; every call reads storage afresh.

use idbroker_storage::{DynStorage, StorageEntry, get_json};

use crate::BrokerResult;
use crate::config::ProviderConfig;
use crate::role::{Role, normalize_name};

/// Storage key of the provider configuration.
pub const CONFIG_KEY: &str = "config";

/// Key prefix of stored roles.
pub const ROLE_PREFIX: &str = "role/";

/// Typed access to broker state.
#[derive(Clone)]
pub struct BrokerStore {
    storage: DynStorage,
}

impl BrokerStore {
    /// Wraps a storage backend.
    #[must_use]
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Loads the provider configuration, if one was written.
    ///
    /// # Errors
    ///
    /// Propagates storage and decoding errors.
    pub async fn config(&self) -> BrokerResult<Option<ProviderConfig>> {
        Ok(get_json(self.storage.as_ref(), CONFIG_KEY).await?)
    }

    /// Replaces the provider configuration.
    ///
    /// # Errors
    ///
    /// Propagates storage and encoding errors.
    pub async fn put_config(&self, config: &ProviderConfig) -> BrokerResult<()> {
        StorageEntry::json(CONFIG_KEY, config)?
            .put_into(self.storage.as_ref())
            .await?;
        Ok(())
    }

    /// Loads a role by name.
    ///
    /// # Errors
    ///
    /// Propagates storage and decoding errors.
    pub async fn role(&self, name: &str) -> BrokerResult<Option<Role>> {
        Ok(get_json(self.storage.as_ref(), &role_key(name)).await?)
    }

    /// Writes a role, replacing any previous definition.
    ///
    /// # Errors
    ///
    /// Propagates storage and encoding errors.
    pub async fn put_role(&self, name: &str, role: &Role) -> BrokerResult<()> {
        StorageEntry::json(role_key(name), role)?
            .put_into(self.storage.as_ref())
            .await?;
        Ok(())
    }

    /// Deletes a role. Deleting an absent role is not an error.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn delete_role(&self, name: &str) -> BrokerResult<()> {
        self.storage.delete(&role_key(name)).await?;
        Ok(())
    }

    /// Lists role names in ascending order.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn list_roles(&self) -> BrokerResult<Vec<String>> {
        Ok(self.storage.list(ROLE_PREFIX).await?)
    }
}

fn role_key(name: &str) -> String {
    format!("{ROLE_PREFIX}{}", normalize_name(name))
}
