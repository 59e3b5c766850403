//! # idbroker-auth
//!
//! Identity broker engine.
//!
//! This crate provides:
//! - OAuth authorization code exchange and identity lookup
//! - Delegated directory group lookup
//! - Role-based authorization into a policy set
//! - Lease issue and renewal with a policy-drift check
//! - Audit logging for security events
//!
//! ## Overview
//!
//! An administrator writes a provider configuration and a set of roles. A
//! user then logs in with an authorization code and a role name; the broker
//! exchanges the code, resolves the user's identity and groups, matches them
//! against the role, and issues a renewable [`lease::Lease`]. Every renewal
//! re-verifies the identity from the stored provider token and refuses to
//! extend the lease if the role now grants a different policy set.
//!
//! ## Modules
//!
//! - [`backend`] - The operation surface hosts route requests to
//! - [`config`] - Administrator-written provider configuration
//! - [`role`] - Role definitions and their validation
//! - [`fields`] - Typed request fields
//! - [`token`] - Provider token and its lease encoding
//! - [`federation`] - Provider and directory round trips
//! - [`authz`] - Matching identities against roles
//! - [`lease`] - Lease issue and renewal
//! - [`storage`] - Broker state over key-value storage
//! - [`settings`] - Host-level engine settings
//! - [`audit`] - Security event audit logging

pub mod audit;
pub mod authz;
pub mod backend;
pub mod config;
pub mod error;
pub mod federation;
pub mod fields;
pub mod lease;
pub mod role;
pub mod settings;
pub mod storage;
pub mod token;

pub use backend::{Backend, Response};
pub use config::{ConfigInput, ProviderConfig};
pub use error::{BrokerError, ErrorCategory, ValidationError};
pub use federation::{IdentityResolver, IdpError, OAuthIdentityResolver, ResolvedIdentity};
pub use fields::{FieldData, FieldValue};
pub use lease::{Lease, LeaseController, LeaseOptions};
pub use role::{Role, RoleInput};
pub use settings::{AuditSettings, BrokerSettings, HttpSettings, ProviderEndpoints, SettingsError};
pub use token::{ProviderToken, TokenCodec};

/// Type alias for broker results.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use idbroker_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::BrokerResult;
    pub use crate::authz::{authorize, same_policy_set};
    pub use crate::backend::{Backend, Response};
    pub use crate::config::{ConfigInput, GroupDelegation, ProviderConfig};
    pub use crate::error::{BrokerError, ErrorCategory, ValidationError};
    pub use crate::federation::{
        IdentityResolver, IdpError, OAuthIdentityResolver, ProviderIdentity, ResolvedIdentity,
    };
    pub use crate::fields::{FieldData, FieldValue};
    pub use crate::lease::{Lease, LeaseController, LeaseOptions};
    pub use crate::role::{Role, RoleInput};
    pub use crate::settings::{BrokerSettings, SettingsError};
    pub use crate::storage::BrokerStore;
    pub use crate::token::{ProviderToken, TokenCodec};
}
